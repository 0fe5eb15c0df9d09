//! Site lifecycle: activation, departure, re-join.

use super::dispatch::reached_final_seq;
use super::state::SequencerState;
use super::SequencerService;
use crate::domain::SiteQueue;
use crate::error::{SequencerError, SequencerResult};
use crate::ports::outbound::{HeldMessageStore, SiteCredentials, SiteRoster};
use shared_types::{SeqNum, SiteId, SiteRecord, SiteStatus};
use tracing::{info, warn};

impl<S, R, C> SequencerService<S, R, C>
where
    S: HeldMessageStore + 'static,
    R: SiteRoster + 'static,
    C: SiteCredentials + 'static,
{
    pub(super) fn activate_locked(&self, state: &mut SequencerState, record: SiteRecord) {
        let site_id = record.site_id;
        let is_remote = site_id != self.credentials().local_site();

        match state.sites.get_mut(&site_id) {
            Some(existing) => {
                // Refresh identity and status; watermarks stay ours.
                existing.public_key = record.public_key;
                existing.status = record.status;
            }
            None => {
                state.sites.insert(site_id, record.clone());
            }
        }

        if is_remote && record.is_participating() && !state.queues.contains_key(&site_id) {
            let seed = state.sites.get(&site_id).unwrap_or(&record);
            state.queues.insert(site_id, SiteQueue::from_record(seed));
            info!("[ism] Activated {}", site_id);
        }
    }

    pub(super) fn partial_deactivate_locked(
        &self,
        state: &mut SequencerState,
        site_id: SiteId,
        final_seq_num: SeqNum,
    ) -> SequencerResult<usize> {
        let site = state
            .sites
            .get_mut(&site_id)
            .ok_or(SequencerError::UnknownSite(site_id))?;
        if !site.is_participating() {
            return Ok(0);
        }
        site.status = SiteStatus::Deactivating { final_seq_num };

        let dropped = state
            .queues
            .get_mut(&site_id)
            .map_or(0, |queue| queue.truncate_after(final_seq_num));
        info!(
            "[ism] {} leaving after seq {}, dropped {} pending",
            site_id, final_seq_num, dropped
        );

        if reached_final_seq(state, site_id) {
            self.deactivate_locked(state, site_id)?;
        } else if !state.is_bootstrap() {
            self.run_dispatch(state)?;
        }
        Ok(dropped)
    }

    /// Removes the queue, marks the site inactive and persists that.
    pub(super) fn deactivate_locked(
        &self,
        state: &mut SequencerState,
        site_id: SiteId,
    ) -> SequencerResult<()> {
        if let Some(queue) = state.queues.remove(&site_id) {
            if queue.pending_len() > 0 {
                warn!(
                    "[ism] Deactivating {} with {} messages still pending",
                    site_id,
                    queue.pending_len()
                );
            }
        }
        if let Some(site) = state.sites.get_mut(&site_id) {
            site.status = SiteStatus::Inactive;
        }

        self.roster().mark_deactivated(site_id)?;
        self.observer().on_site_deactivated(site_id);
        info!("[ism] {} deactivated", site_id);
        Ok(())
    }

    pub(super) fn reset_locked(
        &self,
        state: &mut SequencerState,
        site_id: SiteId,
        applied_public: SeqNum,
        applied_private: SeqNum,
    ) -> SequencerResult<()> {
        let queue = state
            .queues
            .get_mut(&site_id)
            .ok_or(SequencerError::UnknownSite(site_id))?;
        queue.reset_watermarks(applied_public, applied_private);
        if let Some(site) = state.sites.get_mut(&site_id) {
            site.applied_public = applied_public;
            site.applied_private = applied_private;
        }
        info!(
            "[ism] Reset {} to public={} private={}",
            site_id, applied_public, applied_private
        );

        if !state.is_bootstrap() {
            self.run_dispatch(state)?;
        }
        Ok(())
    }
}
