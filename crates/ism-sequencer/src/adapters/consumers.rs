//! Consumer routing.

use crate::domain::{DispatchedIsm, ProcessingOutcome};
use crate::ports::outbound::IsmConsumer;
use shared_types::Routing;
use std::sync::Arc;

/// The three semantic consumers, selected by a message's routing.
#[derive(Clone)]
pub struct ConsumerSet {
    membership: Arc<dyn IsmConsumer>,
    identifiers: Arc<dyn IsmConsumer>,
    repository: Arc<dyn IsmConsumer>,
}

impl ConsumerSet {
    pub fn new(
        membership: Arc<dyn IsmConsumer>,
        identifiers: Arc<dyn IsmConsumer>,
        repository: Arc<dyn IsmConsumer>,
    ) -> Self {
        Self {
            membership,
            identifiers,
            repository,
        }
    }

    /// The same consumer for every routing.
    pub fn uniform(consumer: Arc<dyn IsmConsumer>) -> Self {
        Self::new(consumer.clone(), consumer.clone(), consumer)
    }

    /// Consumer for `routing`; `None` for file-only messages.
    pub fn route(&self, routing: Routing) -> Option<Arc<dyn IsmConsumer>> {
        match routing {
            Routing::Membership => Some(self.membership.clone()),
            Routing::Identifiers => Some(self.identifiers.clone()),
            Routing::Repository => Some(self.repository.clone()),
            Routing::FileOnly => None,
        }
    }
}

impl std::fmt::Debug for ConsumerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumerSet").finish_non_exhaustive()
    }
}

/// Consumer that accepts everything without doing anything.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptAllConsumer;

impl IsmConsumer for AcceptAllConsumer {
    fn consume(&self, _dispatched: &DispatchedIsm) -> ProcessingOutcome {
        ProcessingOutcome::applied()
    }
}
