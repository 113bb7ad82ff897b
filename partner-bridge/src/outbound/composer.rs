//! Outbound event composition.
//!
//! Builds the `{event, timestamp, data}` envelope, signs the exact bytes that
//! will be transmitted, hands the request to the sender under a bounded
//! timeout and records whatever happened in the ledger. Delivery failures
//! are part of the returned record, never an `Err`.

use std::sync::Arc;
use std::time::Duration;

use chrono::SecondsFormat;
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::sender::{EventSender, OutboundRequest};
use crate::clock::Clock;
use crate::error::TransportError;
use crate::ledger::{EventLedger, OutboundEvent};
use crate::session::PartnerSession;
use crate::signature::{self, PARTNER_ID_HEADER, SIGNATURE_HEADER, TIMESTAMP_HEADER};

/// Default bound on a single delivery attempt.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error text kept on a failed delivery record.
pub const MAX_ERROR_MESSAGE_CHARS: usize = 200;

/// Partner id used in the default target URL before registration.
const UNREGISTERED_PARTNER_ID: &str = "unregistered";

/// Builds, signs, sends and records outbound webhooks.
#[derive(Clone)]
pub struct OutboundComposer {
    session: PartnerSession,
    ledger: EventLedger,
    sender: Arc<dyn EventSender>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    counterpart_url: String,
}

impl OutboundComposer {
    pub fn new(
        session: PartnerSession,
        ledger: EventLedger,
        sender: Arc<dyn EventSender>,
        clock: Arc<dyn Clock>,
        counterpart_url: impl Into<String>,
    ) -> Self {
        Self {
            session,
            ledger,
            sender,
            clock,
            timeout: DEFAULT_SEND_TIMEOUT,
            counterpart_url: counterpart_url.into(),
        }
    }

    /// Override the delivery timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send one event to the counterpart and record the outcome.
    ///
    /// # Arguments
    ///
    /// * `event_type` - Event label placed in the envelope
    /// * `data` - Arbitrary event data
    /// * `target_url` - Explicit destination; defaults to the counterpart's
    ///   partner webhook endpoint
    pub async fn send(
        &self,
        event_type: &str,
        data: Value,
        target_url: Option<String>,
    ) -> OutboundEvent {
        let id = Uuid::new_v4().to_string();
        let sent_at = self.clock.now();
        let credentials = self.session.credentials();

        let target_url = target_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| {
                let base = credentials
                    .as_ref()
                    .map(|c| c.counterpart_url.as_str())
                    .unwrap_or(&self.counterpart_url);
                let partner_id = credentials
                    .as_ref()
                    .map(|c| c.partner_id.as_str())
                    .unwrap_or(UNREGISTERED_PARTNER_ID);
                default_target_url(base, partner_id)
            });

        let payload = json!({
            "event": event_type,
            "timestamp": sent_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            "data": data
        });
        // The signature covers exactly these bytes.
        let body = payload.to_string().into_bytes();

        let unix_time = sent_at.timestamp();
        let mut headers = vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            (TIMESTAMP_HEADER.to_string(), unix_time.to_string()),
        ];

        let signer = credentials.as_ref().filter(|c| !c.secret.is_empty());
        if let Some(creds) = signer {
            let signed = signature::sign(&body, creds.secret.as_bytes(), unix_time);
            headers.push((SIGNATURE_HEADER.to_string(), signed.header));
            headers.push((PARTNER_ID_HEADER.to_string(), creds.partner_id.clone()));
        }

        info!(
            event_id = %id,
            event_type = %event_type,
            target_url = %target_url,
            signed = signer.is_some(),
            "outbound_event_sending"
        );

        let request = OutboundRequest {
            url: target_url.clone(),
            headers,
            body,
        };

        // No ledger lock is held while waiting on the sender.
        let result = match tokio::time::timeout(self.timeout, self.sender.send(request)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        let (delivered, response_code, error_message) = match result {
            Ok(response) if response.status < 300 => (true, Some(response.status), None),
            Ok(response) => (
                false,
                Some(response.status),
                Some(truncate_message(&response.body)),
            ),
            Err(e) => (false, None, Some(truncate_message(&e.to_string()))),
        };

        if delivered {
            info!(
                event_id = %id,
                status_code = ?response_code,
                "outbound_event_delivered"
            );
        } else {
            warn!(
                event_id = %id,
                status_code = ?response_code,
                error = error_message.as_deref().unwrap_or_default(),
                "outbound_delivery_failed"
            );
        }

        let event = OutboundEvent {
            id,
            event_type: event_type.to_string(),
            sent_at,
            payload,
            target_url,
            delivered,
            response_code,
            error_message,
        };

        self.ledger.add_outbound(event.clone()).await;

        event
    }
}

/// Counterpart endpoint that receives webhooks from a given partner.
pub fn default_target_url(counterpart_url: &str, partner_id: &str) -> String {
    format!(
        "{}/api/v1/webhooks/partner/{}",
        counterpart_url.trim_end_matches('/'),
        partner_id
    )
}

/// Keep at most [`MAX_ERROR_MESSAGE_CHARS`] characters.
fn truncate_message(message: &str) -> String {
    message.chars().take(MAX_ERROR_MESSAGE_CHARS).collect()
}
