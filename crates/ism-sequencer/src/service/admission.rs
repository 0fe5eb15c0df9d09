//! Admission pipeline: authenticate, filter, persist, enqueue.

use super::state::SequencerState;
use super::SequencerService;
use crate::domain::{check_suitability, AdmissionStats, DropReason, EnqueueOutcome};
use crate::error::{AdmissionError, SequencerResult};
use crate::ports::inbound::{ExchangeChannel, ExchangeOutcome};
use crate::ports::outbound::{HeldMessageStore, SiteCredentials, SiteRoster};
use shared_types::{decode_unverified, Ism};
use tracing::{info, trace, warn};

/// Result of admitting one authenticated message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Admission {
    Admitted,
    Dropped(DropReason),
}

/// Result of re-reading held messages from the store.
#[derive(Debug, Default)]
pub(super) struct Readmission {
    pub stats: AdmissionStats,
    pub purged: usize,
}

impl<S, R, C> SequencerService<S, R, C>
where
    S: HeldMessageStore + 'static,
    R: SiteRoster + 'static,
    C: SiteCredentials + 'static,
{
    pub(super) fn exchange_batch(
        &self,
        batch: &[Vec<u8>],
        channel: &ExchangeChannel,
    ) -> SequencerResult<ExchangeOutcome> {
        let mut state = self.inner.state.lock();
        let mut outcome = ExchangeOutcome::default();

        for encoded in batch {
            outcome.stats.received += 1;

            let ism = match self.authenticate(&state, encoded) {
                Ok(ism) => ism,
                Err(err) => {
                    trace!("[ism] Rejected message from {}: {}", channel.sender, err);
                    outcome.stats.record_error(&err);
                    continue;
                }
            };

            if ism.link_local {
                if !channel.allow_link_local {
                    outcome.stats.link_local_ignored += 1;
                    continue;
                }
                outcome.stats.link_local += 1;
                self.handle_link_local(&mut state, &ism, channel, &mut outcome);
                continue;
            }

            match self.admit(&mut state, ism, encoded)? {
                Admission::Admitted => outcome.stats.admitted += 1,
                Admission::Dropped(reason) => outcome.stats.record_drop(reason),
            }
        }

        self.log_batch(&channel.sender, &outcome.stats);

        if outcome.stats.admitted > 0 && !state.is_bootstrap() {
            self.run_dispatch(&mut state)?;
        }
        if !channel.response_channel {
            outcome.replies.clear();
        }
        Ok(outcome)
    }

    /// Decodes the envelope and checks the origin's signature.
    pub(super) fn authenticate(
        &self,
        state: &SequencerState,
        encoded: &[u8],
    ) -> Result<Ism, AdmissionError> {
        let unverified = decode_unverified(encoded)?;
        let origin = unverified.ism.origin;
        let site = state
            .sites
            .get(&origin)
            .ok_or(AdmissionError::UnknownSender(origin))?;

        if !self
            .credentials()
            .verify(&site.public_key, &unverified.body, &unverified.signature)
        {
            return Err(AdmissionError::BadSignature(origin));
        }
        Ok(unverified.ism)
    }

    /// Suitability checks, then persist and enqueue.
    ///
    /// The held copy is written before the message becomes visible to the
    /// scheduler, so anything queued survives a restart.
    pub(super) fn admit(
        &self,
        state: &mut SequencerState,
        ism: Ism,
        encoded: &[u8],
    ) -> SequencerResult<Admission> {
        let local = self.credentials().local_site();
        let Some(site) = state.sites.get(&ism.origin) else {
            return Ok(Admission::Dropped(DropReason::FromDeactivatedSite));
        };
        if let Err(reason) = check_suitability(&ism, local, site, state.queues.get(&ism.origin)) {
            return Ok(Admission::Dropped(reason));
        }

        let Some(queue) = state.queues.get_mut(&ism.origin) else {
            return Ok(Admission::Dropped(DropReason::FromDeactivatedSite));
        };
        if queue.contains(&ism) {
            return Ok(Admission::Dropped(DropReason::Duplicate));
        }

        self.store().write(ism.key(), encoded)?;
        match queue.enqueue(ism) {
            EnqueueOutcome::Queued => Ok(Admission::Admitted),
            EnqueueOutcome::Duplicate => Ok(Admission::Dropped(DropReason::Duplicate)),
        }
    }

    /// Re-admits up to `limit` of the oldest held messages.
    ///
    /// Held copies that can never be processed (already applied, from a
    /// departed site, unreadable) are removed so they stop occupying the
    /// oldest slots.
    pub(super) fn readmit_held(
        &self,
        state: &mut SequencerState,
        limit: usize,
    ) -> SequencerResult<Readmission> {
        let mut result = Readmission::default();

        for (key, encoded) in self.store().poll_oldest(limit)? {
            result.stats.received += 1;

            let ism = match self.authenticate(state, &encoded) {
                Ok(ism) if !ism.link_local => ism,
                Ok(_) => {
                    self.store().clear(key, false)?;
                    result.purged += 1;
                    continue;
                }
                Err(err) => {
                    warn!("[ism] Held message {} unreadable, removing: {}", key, err);
                    result.stats.record_error(&err);
                    self.store().clear(key, false)?;
                    result.purged += 1;
                    continue;
                }
            };

            match self.admit(state, ism, &encoded)? {
                Admission::Admitted => result.stats.admitted += 1,
                Admission::Dropped(DropReason::Duplicate) => result.stats.duplicate += 1,
                Admission::Dropped(reason) => {
                    result.stats.record_drop(reason);
                    let archive = reason == DropReason::TooOld
                        && self.inner.config.retains_everything();
                    self.store().clear(key, archive)?;
                    result.purged += 1;
                }
            }
        }

        Ok(result)
    }

    pub(super) fn log_batch(&self, sender: &str, stats: &AdmissionStats) {
        if stats.is_quiet() {
            return;
        }
        if stats.rejected() > 0 || stats.control_failures > 0 {
            warn!("[ism] Exchange with {}: {}", sender, stats);
        } else {
            info!("[ism] Exchange with {}: {}", sender, stats);
        }
        self.observer().on_batch_admitted(sender, stats);
    }
}
