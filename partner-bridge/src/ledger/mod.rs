//! Event ledger module.
//!
//! This module provides:
//! - Record types for inbound and outbound webhooks
//! - A bounded, thread-safe store with on-demand statistics
//!
//! The ledger exists for observability only. Nothing survives a restart.

pub mod store;
pub mod types;

pub use store::{EventLedger, DEFAULT_MAX_EVENTS};
pub use types::{
    InboundEvent, LedgerSnapshot, LedgerStats, OutboundEvent, VerificationStatus,
};
