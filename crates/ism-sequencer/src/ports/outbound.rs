//! Driven Ports (SPI - Outbound Dependencies)
//!
//! Durable storage, the site roster, credentials, consumers and the
//! execution strategy are all supplied by the host.

use crate::domain::{AdmissionStats, CompletionRecord, DispatchedIsm, ProcessingOutcome};
use crate::error::StoreError;
use shared_types::{Ism, IsmKey, SeqNum, SitePublicKey, SiteId, SiteRecord, Timestamp, Visibility};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Durable store for messages awaiting processing, plus the archive of
/// processed ones kept for replay.
pub trait HeldMessageStore: Send + Sync {
    /// Persists the signed bytes of a held message. Overwrites are harmless.
    fn write(&self, key: IsmKey, encoded: &[u8]) -> Result<(), StoreError>;

    /// Up to `limit` held messages, oldest write first.
    fn poll_oldest(&self, limit: usize) -> Result<Vec<(IsmKey, Vec<u8>)>, StoreError>;

    /// Removes the held copy; moves it to the archive when `archive` is set.
    fn clear(&self, key: IsmKey, archive: bool) -> Result<(), StoreError>;

    /// Every message from `origin` we can serve to peers, held or archived.
    fn scan_archive(&self, origin: SiteId) -> Result<Vec<Vec<u8>>, StoreError>;
}

/// Durable per-site directory: keys, status and applied watermarks.
pub trait SiteRoster: Send + Sync {
    fn load_all(&self) -> Result<Vec<SiteRecord>, StoreError>;

    fn load(&self, site: SiteId) -> Result<Option<SiteRecord>, StoreError>;

    /// Persists an advanced watermark. Must never move it backwards.
    fn write_watermark(
        &self,
        site: SiteId,
        visibility: Visibility,
        seq_num: SeqNum,
    ) -> Result<(), StoreError>;

    fn mark_deactivated(&self, site: SiteId) -> Result<(), StoreError>;
}

/// Local identity and signature primitives.
pub trait SiteCredentials: Send + Sync {
    fn local_site(&self) -> SiteId;

    /// Signs an encoded ISM body.
    fn sign(&self, body: &[u8]) -> [u8; 64];

    /// Verifies `signature` over `body` against a registered key.
    fn verify(&self, public_key: &SitePublicKey, body: &[u8], signature: &[u8; 64]) -> bool;
}

/// Applies a dispatched message. Must not call back into the sequencer.
pub trait IsmConsumer: Send + Sync {
    fn consume(&self, dispatched: &DispatchedIsm) -> ProcessingOutcome;
}

/// Receives completions produced off the caller's thread.
pub trait CompletionSink: Send + Sync {
    fn report(&self, record: CompletionRecord);
}

/// One unit of consumer work.
pub struct DispatchJob {
    pub dispatched: DispatchedIsm,
    pub consumer: Arc<dyn IsmConsumer>,
    pub sink: Arc<dyn CompletionSink>,
}

/// Where consumer work runs.
///
/// Inline executors return the completion directly; background executors
/// return `None` and later report through the job's sink.
pub trait DispatchExecutor: Send + Sync {
    /// Inline execution means bootstrap mode: no automatic re-dispatch.
    fn is_inline(&self) -> bool;

    fn execute(&self, job: DispatchJob) -> Option<CompletionRecord>;
}

/// Wall clock in milliseconds.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// System clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as Timestamp)
            .unwrap_or(0)
    }
}

/// Hooks for metrics and tests. Every method defaults to a no-op.
pub trait SequencerObserver: Send + Sync {
    fn on_batch_admitted(&self, _sender: &str, _stats: &AdmissionStats) {}

    fn on_dispatched(&self, _ism: &Ism) {}

    fn on_completed(&self, _record: &CompletionRecord) {}

    fn on_site_deactivated(&self, _site: SiteId) {}
}

/// Observer that ignores everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpObserver;

impl SequencerObserver for NoOpObserver {}
