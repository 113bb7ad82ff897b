//! Outbound webhooks to the counterpart.
//!
//! ```text
//! send-event → OutboundComposer (envelope + signature) → EventSender → EventLedger
//! ```

pub mod composer;
pub mod sender;

pub use composer::{default_target_url, OutboundComposer, DEFAULT_SEND_TIMEOUT, MAX_ERROR_MESSAGE_CHARS};
pub use sender::{DeliveryResponse, EventSender, HttpSender, OutboundRequest};
