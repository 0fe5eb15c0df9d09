use super::SequencerService;
use crate::domain::{AdmissionStats, CompletionRecord, DispatchStep, QueueSnapshot};
use crate::error::SequencerResult;
use crate::ports::inbound::{ExchangeChannel, ExchangeOutcome, IsmExchangeApi, PeriodicReport};
use crate::ports::outbound::{DispatchExecutor, HeldMessageStore, SiteCredentials, SiteRoster};
use shared_types::{IsmKey, SeqNum, SiteId, SiteRecord};
use std::sync::Arc;

impl<S, R, C> IsmExchangeApi for SequencerService<S, R, C>
where
    S: HeldMessageStore + 'static,
    R: SiteRoster + 'static,
    C: SiteCredentials + 'static,
{
    fn exchange(
        &self,
        batch: &[Vec<u8>],
        channel: &ExchangeChannel,
    ) -> SequencerResult<ExchangeOutcome> {
        self.exchange_batch(batch, channel)
    }

    fn complete(&self, record: CompletionRecord) -> SequencerResult<()> {
        self.complete_and_continue(record)
    }

    fn activate_site(&self, record: SiteRecord) -> SequencerResult<()> {
        let mut state = self.inner.state.lock();
        self.activate_locked(&mut state, record);
        Ok(())
    }

    fn partial_deactivate(&self, site: SiteId, final_seq_num: SeqNum) -> SequencerResult<usize> {
        let mut state = self.inner.state.lock();
        self.partial_deactivate_locked(&mut state, site, final_seq_num)
    }

    fn full_deactivate(&self, site: SiteId) -> SequencerResult<()> {
        let mut state = self.inner.state.lock();
        self.deactivate_locked(&mut state, site)
    }

    fn reset_site(
        &self,
        site: SiteId,
        applied_public: SeqNum,
        applied_private: SeqNum,
    ) -> SequencerResult<()> {
        let mut state = self.inner.state.lock();
        self.reset_locked(&mut state, site, applied_public, applied_private)
    }

    fn periodic_check(&self) -> SequencerResult<PeriodicReport> {
        let mut state = self.inner.state.lock();
        self.periodic_locked(&mut state)
    }

    fn build_replay_requests(
        &self,
        destination: SiteId,
        targets: &[SiteId],
    ) -> SequencerResult<Vec<Vec<u8>>> {
        let state = self.inner.state.lock();
        self.replay_requests(&state, destination, targets)
    }

    fn gossip_hint_total(&self, site: SiteId) -> u64 {
        self.inner
            .state
            .lock()
            .queues
            .get(&site)
            .map_or(0, |queue| queue.gossip_hint_total())
    }

    fn dispatch_one(&self) -> SequencerResult<DispatchStep> {
        let mut state = self.inner.state.lock();
        self.dispatch_next(&mut state)
    }

    fn recover(&self) -> SequencerResult<AdmissionStats> {
        let mut state = self.inner.state.lock();
        self.recover_locked(&mut state)
    }

    fn go_online(&self, executor: Arc<dyn DispatchExecutor>) -> SequencerResult<()> {
        let mut state = self.inner.state.lock();
        self.go_online_locked(&mut state, executor)
    }

    fn stalled_sites(&self) -> Vec<SiteId> {
        self.inner.state.lock().stalled_sites()
    }

    fn snapshot(&self, site: SiteId) -> Option<QueueSnapshot> {
        self.inner.state.lock().queues.get(&site).map(|queue| queue.snapshot())
    }

    fn in_flight(&self) -> Option<IsmKey> {
        self.inner
            .state
            .lock()
            .current
            .as_ref()
            .map(|current| current.ism.key())
    }
}
