//! # Logging Consumer
//!
//! Stand-in for the membership, identifier and repository consumers on a
//! node with no downstream application wired in. Every message is logged
//! and accepted, so ordering and watermarks advance normally.

use ism_sequencer::{DispatchedIsm, IsmConsumer, ProcessingOutcome};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Logs each dispatched message and reports it applied.
#[derive(Debug)]
pub struct LoggingConsumer {
    name: &'static str,
    consumed: AtomicU64,
}

impl LoggingConsumer {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            consumed: AtomicU64::new(0),
        }
    }

    /// Messages consumed so far.
    pub fn consumed(&self) -> u64 {
        self.consumed.load(Ordering::Relaxed)
    }
}

impl IsmConsumer for LoggingConsumer {
    fn consume(&self, dispatched: &DispatchedIsm) -> ProcessingOutcome {
        let ism = &dispatched.ism;
        self.consumed.fetch_add(1, Ordering::Relaxed);
        if dispatched.expired {
            warn!(
                "[{}] {} ({:?}) arrived after its expiry, applying anyway",
                self.name,
                ism.key(),
                ism.kind
            );
        } else {
            info!(
                "[{}] Applied {} ({:?}, {} payload bytes)",
                self.name,
                ism.key(),
                ism.kind,
                ism.payload.len()
            );
        }
        ProcessingOutcome::applied()
    }
}
