//! Completion records.
//!
//! A consumer answers every dispatched message with a [`ProcessingOutcome`]:
//! whether it succeeded, and which lifecycle steps the sequencer should run.

use crate::config::SequencerConfig;
use shared_types::Ism;

/// Lifecycle steps to run when a message completes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompletionActions {
    /// Persist the advanced watermark (success only).
    pub update_durable_watermark: bool,
    /// Advance or block the origin's queue, and notify the others.
    pub update_queue_state: bool,
    /// Return the message to its queue without blocking.
    pub revert_state: bool,
    /// Remove the held copy from durable storage.
    pub clear_persisted_copy: bool,
    /// Archive the held copy instead of deleting it.
    pub retain_copy: bool,
    /// Emit the completion log line.
    pub log_completion: bool,
}

impl CompletionActions {
    /// Standard steps after a successful apply.
    pub fn applied() -> Self {
        Self {
            update_durable_watermark: true,
            update_queue_state: true,
            revert_state: false,
            clear_persisted_copy: true,
            retain_copy: false,
            log_completion: true,
        }
    }

    /// Standard steps after a failed apply. The held copy stays for retry.
    pub fn failed() -> Self {
        Self {
            update_durable_watermark: false,
            update_queue_state: true,
            revert_state: false,
            clear_persisted_copy: false,
            retain_copy: false,
            log_completion: true,
        }
    }

    /// Put the message back untouched, to be retried on the next pass.
    pub fn retry() -> Self {
        Self {
            revert_state: true,
            update_queue_state: false,
            ..Self::failed()
        }
    }

    pub fn with_retain(mut self) -> Self {
        self.retain_copy = true;
        self
    }
}

/// What a consumer reports for one dispatched message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProcessingOutcome {
    pub success: bool,
    pub actions: CompletionActions,
}

impl ProcessingOutcome {
    pub fn applied() -> Self {
        Self {
            success: true,
            actions: CompletionActions::applied(),
        }
    }

    pub fn failed() -> Self {
        Self {
            success: false,
            actions: CompletionActions::failed(),
        }
    }

    pub fn retry() -> Self {
        Self {
            success: false,
            actions: CompletionActions::retry(),
        }
    }

    /// Applied, and the held copy must be archived.
    pub fn applied_and_retained() -> Self {
        Self {
            success: true,
            actions: CompletionActions::applied().with_retain(),
        }
    }
}

/// A completion reported back to the sequencer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletionRecord {
    pub ism: Ism,
    pub success: bool,
    pub actions: CompletionActions,
}

impl CompletionRecord {
    pub fn new(ism: Ism, outcome: ProcessingOutcome) -> Self {
        Self {
            ism,
            success: outcome.success,
            actions: outcome.actions,
        }
    }

    /// True when the held copy goes to the archive rather than being deleted.
    pub fn should_archive(&self, config: &SequencerConfig) -> bool {
        self.actions.retain_copy || self.ism.archive || config.retains_everything()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Routing, SiteId};

    fn ism() -> Ism {
        Ism::public(SiteId(1), 1, 0, Routing::Repository)
    }

    #[test]
    fn test_failed_keeps_held_copy() {
        let actions = CompletionActions::failed();
        assert!(!actions.clear_persisted_copy);
        assert!(!actions.update_durable_watermark);
        assert!(actions.update_queue_state);
    }

    #[test]
    fn test_archive_decision() {
        let config = SequencerConfig::default();
        let plain = CompletionRecord::new(ism(), ProcessingOutcome::applied());
        assert!(!plain.should_archive(&config));

        let retained = CompletionRecord::new(ism(), ProcessingOutcome::applied_and_retained());
        assert!(retained.should_archive(&config));

        let flagged = CompletionRecord::new(ism().with_archive(), ProcessingOutcome::applied());
        assert!(flagged.should_archive(&config));

        let hub = SequencerConfig {
            hub_site: true,
            ..SequencerConfig::default()
        };
        assert!(plain.should_archive(&hub));
    }
}
