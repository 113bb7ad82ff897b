//! Inbound webhook processing.
//!
//! This is the only place inbound trust decisions are made. Given the raw
//! request body and headers it:
//! 1. Reads the `event` and `timestamp` fields from the body
//! 2. Verifies the signature over the exact body bytes
//! 3. Derives the verification status and stores the event
//!
//! Malformed timestamps and bad signatures never fail the call; they end up
//! as a status and an error message on the stored record.
//!
//! ## Signed form
//!
//! The signature covers the raw request body as it arrived on the wire.
//! The body is never re-serialized before verification: a re-encoded JSON
//! document with different key order or whitespace would hash differently.

use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::ledger::{EventLedger, InboundEvent, VerificationStatus};
use crate::session::PartnerSession;
use crate::signature::{self, Verification};

/// Event type recorded when the payload has no string `event` field.
pub const UNKNOWN_EVENT_TYPE: &str = "unknown";

/// Validates and records inbound webhooks.
#[derive(Clone)]
pub struct WebhookProcessor {
    session: PartnerSession,
    ledger: EventLedger,
    clock: Arc<dyn Clock>,
}

/// The two payload fields the processor understands.
#[derive(Debug, Default, PartialEq)]
struct PayloadView<'a> {
    event: Option<&'a str>,
    timestamp: Option<&'a str>,
}

impl<'a> PayloadView<'a> {
    fn from_value(value: &'a Value) -> Self {
        Self {
            event: value.get("event").and_then(Value::as_str),
            timestamp: value.get("timestamp").and_then(Value::as_str),
        }
    }
}

impl WebhookProcessor {
    pub fn new(session: PartnerSession, ledger: EventLedger, clock: Arc<dyn Clock>) -> Self {
        Self {
            session,
            ledger,
            clock,
        }
    }

    /// Verify and record one inbound webhook, returning the stored record.
    ///
    /// # Arguments
    ///
    /// * `body` - The raw request body, exactly as received
    /// * `signature_header` - The `X-Webhook-Signature` header, if any
    /// * `partner_id` - The `X-Partner-Id` header, if any
    pub async fn process(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
        partner_id: Option<&str>,
    ) -> InboundEvent {
        let id = Uuid::new_v4().to_string();
        let received_at = self.clock.now();

        // Non-JSON bodies are kept as text; the signature still covers the raw bytes.
        let payload: Value = serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));
        let view = PayloadView::from_value(&payload);

        let event_type = view.event.unwrap_or(UNKNOWN_EVENT_TYPE).to_string();
        let occurred_at = view
            .timestamp
            .and_then(parse_event_timestamp)
            .unwrap_or(received_at);

        info!(
            event_id = %id,
            event_type = %event_type,
            has_signature = signature_header.is_some(),
            partner_id = ?partner_id,
            body_length = body.len(),
            "webhook_received"
        );

        // One snapshot of the secret for the whole decision.
        let secret = self.session.secret();
        let outcome = signature::verify(
            signature_header,
            body,
            secret.as_deref().unwrap_or_default(),
            received_at.timestamp(),
        );

        let (verification_status, error_message) = match (&secret, outcome) {
            (None, _) => (VerificationStatus::Received, None),
            (Some(_), Ok(Verification::Authentic)) => (VerificationStatus::Verified, None),
            (Some(_), Ok(Verification::Provisional)) => (VerificationStatus::Received, None),
            (Some(_), Err(e)) => (VerificationStatus::InvalidSignature, Some(e.to_string())),
        };

        match verification_status {
            VerificationStatus::Verified => {
                info!(event_id = %id, event_type = %event_type, "webhook_verified")
            }
            VerificationStatus::InvalidSignature => warn!(
                event_id = %id,
                event_type = %event_type,
                error = error_message.as_deref().unwrap_or_default(),
                "webhook_signature_invalid"
            ),
            VerificationStatus::Received => {
                info!(event_id = %id, event_type = %event_type, "webhook_unverified_no_secret")
            }
        }

        let event = InboundEvent {
            id,
            event_type,
            occurred_at,
            payload,
            verification_status,
            signature_header: signature_header.map(str::to_string),
            caller_partner_id: partner_id.map(str::to_string),
            error_message,
        };

        self.ledger.add_inbound(event.clone()).await;

        event
    }
}

/// Parse an ISO-8601 payload timestamp.
///
/// Accepts RFC 3339 (including a trailing `Z`) and offset-less date-times,
/// which are taken as UTC.
fn parse_event_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
