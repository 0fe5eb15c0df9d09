//! Single-flight round-robin dispatch and completion handling.

use super::state::SequencerState;
use super::SequencerService;
use crate::domain::{
    round_robin_order, CompletionRecord, DispatchStep, DispatchedIsm, InFlight, ProcessingOutcome,
};
use crate::error::{SequencerError, SequencerResult};
use crate::ports::outbound::{DispatchJob, HeldMessageStore, SiteCredentials, SiteRoster};
use shared_types::{Ism, SiteId, SiteRecord, Visibility};
use tracing::{debug, info, warn};

impl<S, R, C> SequencerService<S, R, C>
where
    S: HeldMessageStore + 'static,
    R: SiteRoster + 'static,
    C: SiteCredentials + 'static,
{
    /// Dispatches until something is in flight or nothing is eligible.
    ///
    /// Only inline completions (file-only messages, or an inline executor)
    /// loop back here; background completions re-enter through `complete`.
    pub(super) fn run_dispatch(&self, state: &mut SequencerState) -> SequencerResult<()> {
        while self.dispatch_next(state)?.completed_inline() {}
        Ok(())
    }

    /// One scheduling decision.
    pub(super) fn dispatch_next(&self, state: &mut SequencerState) -> SequencerResult<DispatchStep> {
        if let Some(current) = &state.current {
            return Ok(DispatchStep::Busy(current.ism.key()));
        }

        let order = round_robin_order(state.queues.keys().copied(), state.last_dispatched_origin);
        for site_id in order {
            let Some(ism) = self.take_candidate(state, site_id) else {
                continue;
            };
            return self.hand_off(state, ism);
        }
        Ok(DispatchStep::Idle)
    }

    /// Takes `site_id`'s eligible head if it still passes re-validation.
    fn take_candidate(&self, state: &mut SequencerState, site_id: SiteId) -> Option<Ism> {
        let queue = state.queues.get_mut(&site_id)?;
        let candidate = queue.next_eligible()?;

        // The directory may have changed since admission.
        if let Some(reason) = revalidation_failure(candidate, state.sites.get(&site_id)) {
            debug!(
                "[ism] {} no longer dispatchable ({}), leaving it queued",
                candidate.key(),
                reason
            );
            return None;
        }
        queue.take_for_processing()
    }

    fn hand_off(&self, state: &mut SequencerState, ism: Ism) -> SequencerResult<DispatchStep> {
        let now = self.now();
        let key = ism.key();
        state.current = Some(InFlight {
            ism: ism.clone(),
            dispatched_at: now,
        });
        state.last_dispatched_origin = ism.origin;
        self.observer().on_dispatched(&ism);
        debug!("[ism] Dispatching {}", key);

        let record = match self.inner.ports.consumers.route(ism.routing) {
            None => Some(CompletionRecord::new(ism, ProcessingOutcome::applied())),
            Some(consumer) => {
                let executor = state.executor.clone();
                executor.execute(DispatchJob {
                    dispatched: DispatchedIsm::new(ism, now),
                    consumer,
                    sink: self.sink(),
                })
            }
        };

        match record {
            Some(record) => {
                let success = record.success;
                self.apply_completion(state, record)?;
                Ok(DispatchStep::Completed { key, success })
            }
            None => Ok(DispatchStep::HandedOff(key)),
        }
    }

    /// Completion entry point: apply, then keep the pipeline moving unless
    /// in bootstrap mode.
    pub(super) fn complete_and_continue(&self, record: CompletionRecord) -> SequencerResult<()> {
        let mut state = self.inner.state.lock();
        self.apply_completion(&mut state, record)?;
        if !state.is_bootstrap() {
            self.run_dispatch(&mut state)?;
        }
        Ok(())
    }

    /// Runs the lifecycle steps the consumer asked for.
    ///
    /// The in-flight slot is released before any durable write, so a store
    /// failure never wedges the scheduler.
    pub(super) fn apply_completion(
        &self,
        state: &mut SequencerState,
        record: CompletionRecord,
    ) -> SequencerResult<()> {
        let got = record.ism.key();
        let in_flight = match state.current.take() {
            Some(current) if current.ism == record.ism => current,
            other => {
                let expected = other.as_ref().map(|c| c.ism.key());
                state.current = other;
                return Err(SequencerError::UnexpectedCompletion { expected, got });
            }
        };

        let ism = &record.ism;
        let actions = record.actions;
        let origin = ism.origin;
        let strict = self.inner.config.strict_causal_unblock;

        if let Some(queue) = state.queues.get_mut(&origin) {
            queue.release(ism);
        }

        if actions.update_queue_state {
            if let Some(queue) = state.queues.get_mut(&origin) {
                queue.complete(ism, record.success);
            }
            if record.success {
                for queue in state.queues.values_mut().filter(|q| q.site_id() != origin) {
                    queue.notify_foreign_completion(ism, strict);
                }
                if let Some(site) = state.sites.get_mut(&origin) {
                    advance_watermark(site, ism);
                }
            }
        }

        if actions.revert_state {
            if let Some(queue) = state.queues.get_mut(&origin) {
                queue.revert(ism);
            }
        }

        if actions.update_durable_watermark && record.success {
            self.roster()
                .write_watermark(origin, ism.visibility, ism.seq_num)?;
        }

        if actions.clear_persisted_copy {
            let archive = record.should_archive(&self.inner.config);
            self.store().clear(got, archive)?;
        }

        if actions.log_completion {
            let elapsed = in_flight.elapsed_ms(self.now());
            if record.success {
                info!("[ism] Applied {} in {}ms", got, elapsed);
            } else {
                warn!("[ism] Processing of {} failed after {}ms", got, elapsed);
            }
        }
        self.observer().on_completed(&record);

        if record.success && reached_final_seq(state, origin) {
            info!("[ism] {} reached its final sequence number", origin);
            self.deactivate_locked(state, origin)?;
        }
        Ok(())
    }
}

fn revalidation_failure(ism: &Ism, site: Option<&SiteRecord>) -> Option<&'static str> {
    let Some(site) = site else {
        return Some("site unknown");
    };
    if !site.is_participating() {
        return Some("site inactive");
    }
    if site.final_seq_num().map_or(false, |last| ism.seq_num > last) {
        return Some("past final sequence number");
    }
    None
}

fn advance_watermark(site: &mut SiteRecord, ism: &Ism) {
    let watermark = match ism.visibility {
        Visibility::Public => &mut site.applied_public,
        Visibility::Private => &mut site.applied_private,
    };
    *watermark = (*watermark).max(ism.seq_num);
}

/// True once a deactivating site has nothing left to deliver.
pub(super) fn reached_final_seq(state: &SequencerState, site_id: SiteId) -> bool {
    let Some(final_seq_num) = state.sites.get(&site_id).and_then(SiteRecord::final_seq_num) else {
        return false;
    };
    state.queues.get(&site_id).map_or(false, |queue| {
        queue
            .watermark(Visibility::Public)
            .max(queue.watermark(Visibility::Private))
            >= final_seq_num
    })
}
