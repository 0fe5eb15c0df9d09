//! Sequencer configuration.

use serde::{Deserialize, Serialize};

/// Tunables for the sequencer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Per-exchange cap on messages returned for one replay request.
    pub max_replay_per_exchange: u32,
    /// A dispatch older than this is reported as stuck by the periodic check.
    pub dispatch_warn_after_ms: u64,
    /// Oldest held messages re-admitted per periodic check.
    pub readmit_batch_limit: usize,
    /// Archive every processed message, regardless of its own request.
    pub always_retain: bool,
    /// This site relays for others, so processed messages are archived for replay.
    pub hub_site: bool,
    /// Keep a blocked head blocked until the foreign completion actually
    /// satisfies its declared dependency.
    pub strict_causal_unblock: bool,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            max_replay_per_exchange: 100,
            dispatch_warn_after_ms: 300_000,
            readmit_batch_limit: 1_000,
            always_retain: false,
            hub_site: false,
            strict_causal_unblock: false,
        }
    }
}

impl SequencerConfig {
    /// Small limits so tests exercise caps and batching.
    pub fn for_testing() -> Self {
        Self {
            max_replay_per_exchange: 5,
            dispatch_warn_after_ms: 1_000,
            readmit_batch_limit: 50,
            ..Self::default()
        }
    }

    /// True when processed messages must always be archived.
    pub fn retains_everything(&self) -> bool {
        self.always_retain || self.hub_site
    }
}
