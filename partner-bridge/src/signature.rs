//! Webhook signature generation and verification.
//!
//! Both directions use the same time-bound HMAC-SHA256 scheme:
//!
//! ```text
//! X-Webhook-Signature: t=<unix-seconds>,v1=<hex(HMAC-SHA256(secret, "<t>.<body>"))>
//! ```
//!
//! The signed content is the decimal timestamp, a `.`, then the exact body
//! bytes. Verification rejects timestamps more than
//! [`SIGNATURE_VALIDITY_SECS`] away from the caller's clock in either
//! direction, and compares digests in constant time.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::SignatureError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature, inbound and outbound.
pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Header carrying the signing timestamp on outbound requests.
pub const TIMESTAMP_HEADER: &str = "X-Webhook-Timestamp";

/// Header carrying the caller's partner identifier.
pub const PARTNER_ID_HEADER: &str = "X-Partner-Id";

/// Symmetric tolerance around the verifier's clock (5 minutes).
pub const SIGNATURE_VALIDITY_SECS: u64 = 5 * 60;

/// A freshly produced signature header and the timestamp it binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedHeader {
    pub header: String,
    pub timestamp: i64,
}

/// Successful verification outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The digest matched under the shared secret.
    Authentic,
    /// No secret is established, so nothing could be checked.
    ///
    /// Callers must record this apart from [`Verification::Authentic`].
    Provisional,
}

/// Sign `payload` with `secret` at `timestamp` (unix seconds).
pub fn sign(payload: &[u8], secret: &[u8], timestamp: i64) -> SignedHeader {
    let digest = hex::encode(keyed_mac(secret, timestamp, payload).finalize().into_bytes());

    SignedHeader {
        header: format!("t={},v1={}", timestamp, digest),
        timestamp,
    }
}

/// Verify a signature header against `payload`.
///
/// `now` is the verifier's current unix time in seconds. An empty `secret`
/// means no partner secret is established yet and yields
/// [`Verification::Provisional`] for any present header.
pub fn verify(
    header: Option<&str>,
    payload: &[u8],
    secret: &[u8],
    now: i64,
) -> Result<Verification, SignatureError> {
    let header = match header.map(str::trim) {
        Some(h) if !h.is_empty() => h,
        _ => return Err(SignatureError::MissingHeader),
    };

    if secret.is_empty() {
        return Ok(Verification::Provisional);
    }

    let parts = parse_header(header)?;

    let age = now.abs_diff(parts.timestamp);
    if age > SIGNATURE_VALIDITY_SECS {
        warn!(
            signed_at = parts.timestamp,
            now = now,
            age_seconds = age,
            max_age_seconds = SIGNATURE_VALIDITY_SECS,
            "signature_stale"
        );
        return Err(SignatureError::Expired { age });
    }

    // Undecodable hex can never match a digest.
    let received = hex::decode(parts.signature).map_err(|_| SignatureError::Mismatch)?;

    keyed_mac(secret, parts.timestamp, payload)
        .verify_slice(&received)
        .map(|()| Verification::Authentic)
        .map_err(|_| {
            warn!(
                received_length = parts.signature.len(),
                "signature_mismatch"
            );
            SignatureError::Mismatch
        })
}

/// Parsed `t=..,v1=..` header.
#[derive(Debug, PartialEq, Eq)]
struct HeaderParts<'a> {
    timestamp: i64,
    signature: &'a str,
}

fn parse_header(header: &str) -> Result<HeaderParts<'_>, SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) if timestamp.is_none() => timestamp = Some(value),
            Some(("v1", value)) if signature.is_none() => signature = Some(value),
            _ => {}
        }
    }

    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return Err(SignatureError::InvalidFormat);
    };

    let timestamp = timestamp
        .parse::<i64>()
        .map_err(|e| SignatureError::Parse(e.to_string()))?;

    Ok(HeaderParts {
        timestamp,
        signature,
    })
}

fn keyed_mac(secret: &[u8], timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}
