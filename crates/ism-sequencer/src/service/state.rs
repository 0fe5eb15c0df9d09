use crate::domain::{InFlight, SiteQueue};
use crate::ports::outbound::DispatchExecutor;
use shared_types::{SiteId, SiteRecord};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mutable sequencer state, guarded by the service mutex.
pub(crate) struct SequencerState {
    /// Site directory: every known site, including departed ones.
    pub sites: BTreeMap<SiteId, SiteRecord>,
    /// Queue state for participating remote sites.
    pub queues: BTreeMap<SiteId, SiteQueue>,
    /// The one message in flight across all origins.
    pub current: Option<InFlight>,
    /// Origin served by the last dispatch; round-robin starts after it.
    pub last_dispatched_origin: SiteId,
    pub executor: Arc<dyn DispatchExecutor>,
}

impl SequencerState {
    pub fn new(executor: Arc<dyn DispatchExecutor>) -> Self {
        Self {
            sites: BTreeMap::new(),
            queues: BTreeMap::new(),
            current: None,
            last_dispatched_origin: SiteId(0),
            executor,
        }
    }

    pub fn is_bootstrap(&self) -> bool {
        self.executor.is_inline()
    }

    /// Queues that hold messages yet cannot dispatch any.
    pub fn stalled_sites(&self) -> Vec<SiteId> {
        self.queues
            .values()
            .filter(|queue| queue.is_stalled())
            .map(|queue| queue.site_id())
            .collect()
    }
}
