//! Typed errors for the bridge.
//!
//! Inbound and outbound failures are recorded on the event records rather
//! than propagated, so most of these types end up rendered into an
//! `error_message` field. Their `Display` output is the stored text.

use thiserror::Error;

/// Reasons a signature header fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("missing header")]
    MissingHeader,

    /// A `t` or `v1` entry is absent.
    #[error("invalid format")]
    InvalidFormat,

    /// The `t` entry is not an integer.
    #[error("parse error: {0}")]
    Parse(String),

    #[error("signature expired (age: {age}s)")]
    Expired { age: u64 },

    #[error("signature mismatch")]
    Mismatch,
}

/// Failures reported by an outbound sender before any response arrived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Connection timeout")]
    Timeout,

    #[error("Connection error: {0}")]
    Connection(String),
}

/// Partner session lifecycle violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("partner session is already registered as {partner_id}")]
    AlreadyRegistered { partner_id: String },
}

/// Failures of the registration handshake with the counterpart.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Partner with similar name already exists")]
    Conflict,

    #[error("registration rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid counterpart url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("malformed registration response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RegistrationError {
    /// HTTP status reported by the counterpart, when one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RegistrationError::Conflict => Some(409),
            RegistrationError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Connection(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_error_messages() {
        assert_eq!(SignatureError::MissingHeader.to_string(), "missing header");
        assert_eq!(SignatureError::InvalidFormat.to_string(), "invalid format");
        assert_eq!(
            SignatureError::Parse("invalid digit found in string".to_string()).to_string(),
            "parse error: invalid digit found in string"
        );
        assert_eq!(
            SignatureError::Expired { age: 301 }.to_string(),
            "signature expired (age: 301s)"
        );
        assert_eq!(SignatureError::Mismatch.to_string(), "signature mismatch");
    }

    #[test]
    fn test_transport_error_messages() {
        assert_eq!(TransportError::Timeout.to_string(), "Connection timeout");
        assert_eq!(
            TransportError::Connection("refused".to_string()).to_string(),
            "Connection error: refused"
        );
    }

    #[test]
    fn test_registration_status_code() {
        assert_eq!(RegistrationError::Conflict.status_code(), Some(409));
        assert_eq!(
            RegistrationError::Rejected {
                status: 422,
                body: "bad".to_string()
            }
            .status_code(),
            Some(422)
        );
        assert_eq!(
            RegistrationError::Transport(TransportError::Timeout).status_code(),
            None
        );
    }
}
