//! Partner session: the credentials obtained from registration.
//!
//! The session starts unregistered and can be written exactly once. Readers
//! see either no credentials or the complete set, never a partial write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::SessionError;

/// Credentials issued by the counterpart on registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartnerCredentials {
    pub partner_id: String,
    /// Shared HMAC secret.
    pub secret: String,
    pub registered_at: DateTime<Utc>,
    /// Counterpart base URL the registration was made against.
    pub counterpart_url: String,
}

/// Public view of the session. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub registered: bool,
    pub partner_id: Option<String>,
    pub secret_set: bool,
    pub registered_at: Option<DateTime<Utc>>,
    pub counterpart_url: Option<String>,
}

/// Shared handle to the partner credentials.
#[derive(Clone, Default)]
pub struct PartnerSession {
    credentials: Arc<OnceCell<PartnerCredentials>>,
}

impl PartnerSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the credentials. Fails if the session was already registered.
    pub fn register(&self, credentials: PartnerCredentials) -> Result<(), SessionError> {
        let partner_id = credentials.partner_id.clone();
        let secret_set = !credentials.secret.is_empty();

        self.credentials.set(credentials).map_err(|_| {
            let existing = self.partner_id().unwrap_or_default();
            warn!(
                partner_id = %existing,
                attempted_partner_id = %partner_id,
                "partner_session_already_registered"
            );
            SessionError::AlreadyRegistered {
                partner_id: existing,
            }
        })?;

        info!(partner_id = %partner_id, secret_set = secret_set, "partner_session_registered");
        Ok(())
    }

    /// Snapshot of the credentials, if registered.
    pub fn credentials(&self) -> Option<PartnerCredentials> {
        self.credentials.get().cloned()
    }

    /// Shared secret bytes, if one is established.
    pub fn secret(&self) -> Option<Vec<u8>> {
        self.credentials
            .get()
            .filter(|c| !c.secret.is_empty())
            .map(|c| c.secret.as_bytes().to_vec())
    }

    pub fn partner_id(&self) -> Option<String> {
        self.credentials.get().map(|c| c.partner_id.clone())
    }

    pub fn is_registered(&self) -> bool {
        self.credentials.initialized()
    }

    pub fn status(&self) -> SessionStatus {
        match self.credentials.get() {
            Some(c) => SessionStatus {
                registered: true,
                partner_id: Some(c.partner_id.clone()),
                secret_set: !c.secret.is_empty(),
                registered_at: Some(c.registered_at),
                counterpart_url: Some(c.counterpart_url.clone()),
            },
            None => SessionStatus {
                registered: false,
                partner_id: None,
                secret_set: false,
                registered_at: None,
                counterpart_url: None,
            },
        }
    }
}
