//! Bounded in-memory event ledger.
//!
//! Both sequences sit behind one lock so inserts, truncation, clears and
//! reads are serialized against each other. Readers always get cloned
//! snapshots, never references into the live storage.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use super::types::{InboundEvent, LedgerSnapshot, LedgerStats, OutboundEvent, VerificationStatus};

/// Default number of records retained per sequence.
pub const DEFAULT_MAX_EVENTS: usize = 100;

/// Shared handle to the ledger. Cloning shares the same storage.
#[derive(Clone)]
pub struct EventLedger {
    inner: Arc<LedgerInner>,
}

struct LedgerInner {
    max_events: usize,
    sequences: RwLock<Sequences>,
}

/// Most-recent-first sequences.
#[derive(Default)]
struct Sequences {
    inbound: VecDeque<InboundEvent>,
    outbound: VecDeque<OutboundEvent>,
}

impl EventLedger {
    /// Create a ledger retaining at most `max_events` records per sequence.
    pub fn new(max_events: usize) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                max_events,
                sequences: RwLock::new(Sequences::default()),
            }),
        }
    }

    /// Record an inbound event as the most recent, evicting the oldest past the cap.
    pub async fn add_inbound(&self, event: InboundEvent) {
        let mut sequences = self.inner.sequences.write().await;
        sequences.inbound.push_front(event);
        let evicted = truncate(&mut sequences.inbound, self.inner.max_events);

        debug!(
            retained = sequences.inbound.len(),
            evicted = evicted,
            "ledger_inbound_added"
        );
    }

    /// Record an outbound event as the most recent, evicting the oldest past the cap.
    pub async fn add_outbound(&self, event: OutboundEvent) {
        let mut sequences = self.inner.sequences.write().await;
        sequences.outbound.push_front(event);
        let evicted = truncate(&mut sequences.outbound, self.inner.max_events);

        debug!(
            retained = sequences.outbound.len(),
            evicted = evicted,
            "ledger_outbound_added"
        );
    }

    /// Inbound events, most recent first.
    pub async fn list_inbound(&self) -> Vec<InboundEvent> {
        let sequences = self.inner.sequences.read().await;
        sequences.inbound.iter().cloned().collect()
    }

    /// Outbound events, most recent first.
    pub async fn list_outbound(&self) -> Vec<OutboundEvent> {
        let sequences = self.inner.sequences.read().await;
        sequences.outbound.iter().cloned().collect()
    }

    /// Empty both sequences in one step.
    pub async fn clear(&self) {
        let mut sequences = self.inner.sequences.write().await;
        let inbound = sequences.inbound.len();
        let outbound = sequences.outbound.len();
        sequences.inbound.clear();
        sequences.outbound.clear();

        info!(
            inbound_cleared = inbound,
            outbound_cleared = outbound,
            "ledger_cleared"
        );
    }

    /// Counters computed from the current contents.
    pub async fn stats(&self) -> LedgerStats {
        let sequences = self.inner.sequences.read().await;
        compute_stats(&sequences)
    }

    /// Both sequences and their stats, taken under a single read lock.
    pub async fn snapshot(&self) -> LedgerSnapshot {
        let sequences = self.inner.sequences.read().await;
        LedgerSnapshot {
            received: sequences.inbound.iter().cloned().collect(),
            sent: sequences.outbound.iter().cloned().collect(),
            stats: compute_stats(&sequences),
        }
    }
}

impl Default for EventLedger {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_EVENTS)
    }
}

/// Drop entries past `max` from the back. Returns how many were dropped.
fn truncate<T>(queue: &mut VecDeque<T>, max: usize) -> usize {
    let excess = queue.len().saturating_sub(max);
    queue.truncate(max);
    excess
}

fn compute_stats(sequences: &Sequences) -> LedgerStats {
    let mut events_by_type = BTreeMap::new();
    let mut received_verified = 0;
    let mut received_invalid = 0;

    for event in &sequences.inbound {
        *events_by_type.entry(event.event_type.clone()).or_insert(0) += 1;
        match event.verification_status {
            VerificationStatus::Verified => received_verified += 1,
            VerificationStatus::InvalidSignature => received_invalid += 1,
            VerificationStatus::Received => {}
        }
    }

    let sent_success = sequences.outbound.iter().filter(|e| e.delivered).count();

    LedgerStats {
        total_received: sequences.inbound.len(),
        total_sent: sequences.outbound.len(),
        received_verified,
        received_invalid,
        sent_success,
        sent_failed: sequences.outbound.len() - sent_success,
        events_by_type,
    }
}
