//! Periodic maintenance, start-up recovery and the switch out of bootstrap.

use super::state::SequencerState;
use super::SequencerService;
use crate::domain::AdmissionStats;
use crate::error::SequencerResult;
use crate::ports::inbound::{PeriodicReport, StuckDispatch};
use crate::ports::outbound::{DispatchExecutor, HeldMessageStore, SiteCredentials, SiteRoster};
use std::sync::Arc;
use tracing::{info, warn};

impl<S, R, C> SequencerService<S, R, C>
where
    S: HeldMessageStore + 'static,
    R: SiteRoster + 'static,
    C: SiteCredentials + 'static,
{
    pub(super) fn periodic_locked(&self, state: &mut SequencerState) -> SequencerResult<PeriodicReport> {
        let mut report = PeriodicReport::default();

        if let Some(current) = &state.current {
            let elapsed_ms = current.elapsed_ms(self.now());
            if elapsed_ms > self.inner.config.dispatch_warn_after_ms {
                warn!(
                    "[ism] {} has been in flight for {}ms",
                    current.ism.key(),
                    elapsed_ms
                );
                report.stuck = Some(StuckDispatch {
                    key: current.ism.key(),
                    elapsed_ms,
                });
            }
        }

        let readmission = self.readmit_held(state, self.inner.config.readmit_batch_limit)?;
        report.readmitted = readmission.stats;
        report.purged = readmission.purged;
        if report.readmitted.admitted > 0 || report.purged > 0 {
            info!(
                "[ism] Re-admission: {} (purged {})",
                report.readmitted, report.purged
            );
        }

        // Also restarts a scheduler idled by an earlier store failure.
        if !state.is_bootstrap() {
            self.run_dispatch(state)?;
        }

        report.stalled = state.stalled_sites();
        for site in &report.stalled {
            warn!("[ism] {} has pending messages but none can be dispatched", site);
        }
        Ok(report)
    }

    pub(super) fn recover_locked(&self, state: &mut SequencerState) -> SequencerResult<AdmissionStats> {
        let records = self.roster().load_all()?;
        let site_count = records.len();
        for record in records {
            self.activate_locked(state, record);
        }

        let readmission = self.readmit_held(state, usize::MAX)?;
        info!(
            "[ism] Recovered {} sites, held messages: {} (purged {})",
            site_count, readmission.stats, readmission.purged
        );

        if !state.is_bootstrap() {
            self.run_dispatch(state)?;
        }
        Ok(readmission.stats)
    }

    pub(super) fn go_online_locked(
        &self,
        state: &mut SequencerState,
        executor: Arc<dyn DispatchExecutor>,
    ) -> SequencerResult<()> {
        state.executor = executor;
        if state.is_bootstrap() {
            warn!("[ism] go_online called with an inline executor, staying in bootstrap mode");
            return Ok(());
        }
        info!("[ism] Leaving bootstrap mode");
        self.run_dispatch(state)
    }
}
