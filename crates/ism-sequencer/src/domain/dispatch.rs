//! Dispatch scheduling primitives.
//!
//! At most one message is in flight across all origins. The next origin to
//! serve is chosen round-robin, starting just after the last origin served.

use shared_types::{Ism, IsmKey, SiteId, Timestamp};

/// The single message currently being processed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InFlight {
    pub ism: Ism,
    pub dispatched_at: Timestamp,
}

impl InFlight {
    pub fn elapsed_ms(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.dispatched_at)
    }
}

/// A message handed to a consumer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DispatchedIsm {
    pub ism: Ism,
    pub dispatched_at: Timestamp,
    /// Past its expiry deadline. Consumers may run their reactive behaviour.
    pub expired: bool,
}

impl DispatchedIsm {
    pub fn new(ism: Ism, now: Timestamp) -> Self {
        Self {
            expired: ism.is_expired(now),
            ism,
            dispatched_at: now,
        }
    }
}

/// What one dispatch attempt did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DispatchStep {
    /// Nothing eligible anywhere.
    Idle,
    /// Another message is still in flight.
    Busy(IsmKey),
    /// Handed to a background worker; its completion arrives later.
    HandedOff(IsmKey),
    /// Processed and completed inline.
    Completed { key: IsmKey, success: bool },
}

impl DispatchStep {
    /// True if this step made progress and the scheduler should try again.
    pub fn completed_inline(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Sites in round-robin service order after `last`.
pub fn round_robin_order(sites: impl IntoIterator<Item = SiteId>, last: SiteId) -> Vec<SiteId> {
    let mut order: Vec<SiteId> = sites.into_iter().collect();
    order.sort_by_key(|site| site.round_robin_rank(last));
    order
}
