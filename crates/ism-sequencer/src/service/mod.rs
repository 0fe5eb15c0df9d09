//! # Sequencer Service
//!
//! Owns every queue, the site directory and the single in-flight slot under
//! one mutex. All public entry points lock it, so admission, dispatch,
//! completion and lifecycle changes are serialized.
//!
//! ```text
//! exchange ──→ authenticate ──→ suitability ──→ persist ──→ enqueue
//!                                                              │
//!                    ┌──────────── dispatch (round-robin) ←────┘
//!                    ↓
//!              executor ──→ consumer ──→ complete ──→ dispatch again
//! ```
//!
//! ## Modes
//!
//! With an inline executor the service is in bootstrap mode: nothing is
//! dispatched automatically and the caller drains with `dispatch_one`.
//! `go_online` swaps in a background executor, after which every admitted
//! batch and every completion re-enters the scheduler.

mod admission;
mod api;
mod dispatch;
mod gossip;
mod lifecycle;
mod periodic;
mod state;


use crate::adapters::ConsumerSet;
use crate::config::SequencerConfig;
use crate::domain::CompletionRecord;
use crate::ports::outbound::{
    CompletionSink, DispatchExecutor, HeldMessageStore, NoOpObserver, SequencerObserver,
    SiteCredentials, SiteRoster, SystemTimeSource, TimeSource,
};
use parking_lot::Mutex;
use state::SequencerState;
use std::sync::Arc;
use tracing::error;

/// Everything the service talks to.
pub struct SequencerPorts<S, R, C> {
    pub store: Arc<S>,
    pub roster: Arc<R>,
    pub credentials: Arc<C>,
    pub consumers: ConsumerSet,
    pub time: Arc<dyn TimeSource>,
    pub observer: Arc<dyn SequencerObserver>,
}

impl<S, R, C> SequencerPorts<S, R, C> {
    /// Ports with the system clock and no observer.
    pub fn new(store: Arc<S>, roster: Arc<R>, credentials: Arc<C>, consumers: ConsumerSet) -> Self {
        Self {
            store,
            roster,
            credentials,
            consumers,
            time: Arc::new(SystemTimeSource),
            observer: Arc::new(NoOpObserver),
        }
    }

    pub fn with_time_source(mut self, time: Arc<dyn TimeSource>) -> Self {
        self.time = time;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SequencerObserver>) -> Self {
        self.observer = observer;
        self
    }
}

struct Inner<S, R, C> {
    config: SequencerConfig,
    ports: SequencerPorts<S, R, C>,
    state: Mutex<SequencerState>,
}

/// ISM sequencer.
///
/// Cheap to clone; clones share state.
pub struct SequencerService<S, R, C>
where
    S: HeldMessageStore,
    R: SiteRoster,
    C: SiteCredentials,
{
    inner: Arc<Inner<S, R, C>>,
}

impl<S, R, C> Clone for SequencerService<S, R, C>
where
    S: HeldMessageStore,
    R: SiteRoster,
    C: SiteCredentials,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, R, C> SequencerService<S, R, C>
where
    S: HeldMessageStore + 'static,
    R: SiteRoster + 'static,
    C: SiteCredentials + 'static,
{
    /// Creates a service with an empty site directory.
    ///
    /// Call `recover` to load the roster and held messages. An inline
    /// `executor` starts the service in bootstrap mode.
    pub fn new(
        config: SequencerConfig,
        ports: SequencerPorts<S, R, C>,
        executor: Arc<dyn DispatchExecutor>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                ports,
                state: Mutex::new(SequencerState::new(executor)),
            }),
        }
    }

    pub fn config(&self) -> &SequencerConfig {
        &self.inner.config
    }

    /// True while consumers run inline and dispatch is caller-driven.
    pub fn is_bootstrap(&self) -> bool {
        self.inner.state.lock().is_bootstrap()
    }

    fn store(&self) -> &S {
        &self.inner.ports.store
    }

    fn roster(&self) -> &R {
        &self.inner.ports.roster
    }

    fn credentials(&self) -> &C {
        &self.inner.ports.credentials
    }

    fn observer(&self) -> &dyn SequencerObserver {
        self.inner.ports.observer.as_ref()
    }

    fn now(&self) -> shared_types::Timestamp {
        self.inner.ports.time.now()
    }

    fn sink(&self) -> Arc<dyn CompletionSink> {
        Arc::new(self.clone())
    }
}

impl<S, R, C> CompletionSink for SequencerService<S, R, C>
where
    S: HeldMessageStore + 'static,
    R: SiteRoster + 'static,
    C: SiteCredentials + 'static,
{
    fn report(&self, record: CompletionRecord) {
        let key = record.ism.key();
        if let Err(err) = self.complete_and_continue(record) {
            error!("[ism] Completion of {} failed: {}", key, err);
        }
    }
}
