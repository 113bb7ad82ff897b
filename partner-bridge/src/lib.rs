//! Partner Bridge - signed bidirectional webhooks between two B2B partners.
//!
//! The library core is small:
//! - [`signature`]: time-bound HMAC-SHA256 signing and verification
//! - [`ledger`]: bounded, thread-safe record of inbound and outbound events
//! - [`inbound`]: verifies and records webhooks from the counterpart
//! - [`outbound`]: signs, sends and records webhooks to the counterpart
//!
//! Around it sit the partner session, the registration client and the axum
//! web layer used by the `partner-bridge` binary.
//!
//! ## Architecture
//!
//! ```text
//! inbound:  HTTP body → WebhookProcessor → verify → EventLedger
//! outbound: send-event → OutboundComposer → sign → EventSender → EventLedger
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod inbound;
pub mod ledger;
pub mod outbound;
pub mod registration;
pub mod session;
pub mod signature;
pub mod web;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{RegistrationError, SessionError, SignatureError, TransportError};
pub use inbound::WebhookProcessor;
pub use ledger::{
    EventLedger, InboundEvent, LedgerSnapshot, LedgerStats, OutboundEvent, VerificationStatus,
};
pub use outbound::{EventSender, HttpSender, OutboundComposer};
pub use registration::RegistrationClient;
pub use session::{PartnerCredentials, PartnerSession};
pub use signature::{sign, verify, Verification};
pub use web::AppState;
