//! Driving Ports (API - Inbound)
//!
//! What the transport, the membership logic and the node runtime call.

use crate::domain::{AdmissionStats, CompletionRecord, DispatchStep, QueueSnapshot};
use crate::error::SequencerResult;
use crate::ports::outbound::DispatchExecutor;
use serde::Serialize;
use shared_types::{IsmKey, SeqNum, SiteId, SiteRecord};
use std::sync::Arc;

/// Properties of the channel a batch arrived on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExchangeChannel {
    /// Peer label for logs.
    pub sender: String,
    /// Replies can be sent back on this channel.
    pub response_channel: bool,
    /// Link-local control messages are honoured on this channel.
    pub allow_link_local: bool,
}

impl ExchangeChannel {
    /// A full peer exchange: replies and control messages allowed.
    pub fn peer(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            response_channel: true,
            allow_link_local: true,
        }
    }

    /// One-way delivery, e.g. a file drop.
    pub fn one_way(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            response_channel: false,
            allow_link_local: false,
        }
    }
}

/// Result of one exchange.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExchangeOutcome {
    pub stats: AdmissionStats,
    /// Signed messages to send back to the peer.
    pub replies: Vec<Vec<u8>>,
}

/// A dispatch that has been in flight longer than configured.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StuckDispatch {
    pub key: IsmKey,
    pub elapsed_ms: u64,
}

/// Result of one periodic maintenance pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PeriodicReport {
    pub stuck: Option<StuckDispatch>,
    pub readmitted: AdmissionStats,
    /// Held copies removed because they can never be processed.
    pub purged: usize,
    pub stalled: Vec<SiteId>,
}

/// Primary sequencer API.
pub trait IsmExchangeApi: Send + Sync {
    /// Authenticates, filters, persists and queues a batch of signed
    /// messages, handling link-local control messages along the way.
    fn exchange(&self, batch: &[Vec<u8>], channel: &ExchangeChannel)
        -> SequencerResult<ExchangeOutcome>;

    /// Reports the completion of the in-flight message.
    fn complete(&self, record: CompletionRecord) -> SequencerResult<()>;

    /// Adds a site to the directory, or refreshes it. Idempotent.
    fn activate_site(&self, record: SiteRecord) -> SequencerResult<()>;

    /// Starts a site's departure. Returns how many pending messages were dropped.
    fn partial_deactivate(&self, site: SiteId, final_seq_num: SeqNum) -> SequencerResult<usize>;

    /// Removes a site's queue state and marks it inactive.
    fn full_deactivate(&self, site: SiteId) -> SequencerResult<()>;

    /// Rebases a site's watermarks after a re-join.
    fn reset_site(&self, site: SiteId, applied_public: SeqNum, applied_private: SeqNum)
        -> SequencerResult<()>;

    /// Stuck-dispatch check, re-admission of held messages, stall report.
    fn periodic_check(&self) -> SequencerResult<PeriodicReport>;

    /// Signed replay requests for `targets`, addressed to `destination`.
    fn build_replay_requests(
        &self,
        destination: SiteId,
        targets: &[SiteId],
    ) -> SequencerResult<Vec<Vec<u8>>>;

    /// Backlog `site` reported it can replay to us, summed over origins.
    fn gossip_hint_total(&self, site: SiteId) -> u64;

    /// Runs exactly one dispatch attempt. Used to drain in bootstrap mode.
    fn dispatch_one(&self) -> SequencerResult<DispatchStep>;

    /// Loads the roster and re-admits every held message.
    fn recover(&self) -> SequencerResult<AdmissionStats>;

    /// Leaves bootstrap mode: installs a background executor and dispatches.
    fn go_online(&self, executor: Arc<dyn DispatchExecutor>) -> SequencerResult<()>;

    fn stalled_sites(&self) -> Vec<SiteId>;

    fn snapshot(&self, site: SiteId) -> Option<QueueSnapshot>;

    fn in_flight(&self) -> Option<IsmKey>;
}
