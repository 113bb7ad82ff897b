//! Event record shapes stored in the ledger.
//!
//! Field names serialize to the keys the dashboard API has always exposed
//! (`timestamp`, `status`, `signature`, `success`, ...).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verification outcome of an inbound webhook.
///
/// Terminal once the event is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// No shared secret was established, so verification was not attempted.
    Received,
    /// Signature checked under the shared secret.
    Verified,
    /// A secret was established but the header was missing, malformed,
    /// expired or did not match.
    InvalidSignature,
}

/// A webhook received from the counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: String,
    pub event_type: String,
    /// Payload `timestamp` when parseable, otherwise receipt time.
    #[serde(rename = "timestamp")]
    pub occurred_at: DateTime<Utc>,
    pub payload: serde_json::Value,
    #[serde(rename = "status")]
    pub verification_status: VerificationStatus,
    /// Raw `X-Webhook-Signature` header as received.
    #[serde(rename = "signature")]
    pub signature_header: Option<String>,
    /// Raw `X-Partner-Id` header as received.
    #[serde(rename = "partner_id")]
    pub caller_partner_id: Option<String>,
    /// Set only for [`VerificationStatus::InvalidSignature`].
    pub error_message: Option<String>,
}

/// A webhook this partner sent to the counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub id: String,
    pub event_type: String,
    #[serde(rename = "timestamp")]
    pub sent_at: DateTime<Utc>,
    /// The `{event, timestamp, data}` envelope exactly as transmitted.
    pub payload: serde_json::Value,
    pub target_url: String,
    #[serde(rename = "success")]
    pub delivered: bool,
    pub response_code: Option<u16>,
    pub error_message: Option<String>,
}

/// Aggregate counters derived from the ledger contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_received: usize,
    pub total_sent: usize,
    pub received_verified: usize,
    pub received_invalid: usize,
    pub sent_success: usize,
    pub sent_failed: usize,
    /// Inbound occurrences per event type.
    pub events_by_type: BTreeMap<String, usize>,
}

/// Consistent view of both sequences and their stats.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LedgerSnapshot {
    pub received: Vec<InboundEvent>,
    pub sent: Vec<OutboundEvent>,
    pub stats: LedgerStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&VerificationStatus::InvalidSignature).unwrap();
        assert_eq!(json, "\"invalid_signature\"");
    }

    #[test]
    fn test_inbound_event_wire_keys() {
        let event = InboundEvent {
            id: "evt-1".to_string(),
            event_type: "payment.created".to_string(),
            occurred_at: DateTime::from_timestamp(1_704_067_200, 0).unwrap(),
            payload: serde_json::json!({"event": "payment.created"}),
            verification_status: VerificationStatus::Verified,
            signature_header: Some("t=1,v1=aa".to_string()),
            caller_partner_id: None,
            error_message: None,
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["status"], "verified");
        assert_eq!(value["signature"], "t=1,v1=aa");
        assert_eq!(value["timestamp"], "2024-01-01T00:00:00Z");
        assert!(value["partner_id"].is_null());
    }

    #[test]
    fn test_outbound_event_wire_keys() {
        let event = OutboundEvent {
            id: "out-1".to_string(),
            event_type: "reservation.confirmed".to_string(),
            sent_at: DateTime::from_timestamp(1_704_067_200, 0).unwrap(),
            payload: serde_json::json!({}),
            target_url: "http://localhost:3000/hook".to_string(),
            delivered: false,
            response_code: Some(500),
            error_message: Some("boom".to_string()),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["success"], false);
        assert_eq!(value["response_code"], 500);
    }
}
