//! Link-local control messages: replay requests, replay responses and the
//! backlog hints they carry.
//!
//! ```text
//! requester                               peer
//!   │── ReplayRequest(target, watermarks) ──→│
//!   │←── replayed ISMs (oldest first) ───────│
//!   │←── ReplayResponse(matching, replayed) ─│
//! ```

use super::state::SequencerState;
use super::SequencerService;
use crate::domain::{select_replay, ArchivedIsm};
use crate::error::SequencerResult;
use crate::ports::inbound::{ExchangeChannel, ExchangeOutcome};
use crate::ports::outbound::{HeldMessageStore, SiteCredentials, SiteRoster};
use shared_types::{
    encode_body, encode_signed, ControlMessage, Ism, ReplayRequest, ReplayResponse, SiteId,
    Visibility,
};
use tracing::{debug, warn};

impl<S, R, C> SequencerService<S, R, C>
where
    S: HeldMessageStore + 'static,
    R: SiteRoster + 'static,
    C: SiteCredentials + 'static,
{
    /// Handles one authenticated link-local message. Failures are counted,
    /// never propagated.
    pub(super) fn handle_link_local(
        &self,
        state: &mut SequencerState,
        ism: &Ism,
        channel: &ExchangeChannel,
        outcome: &mut ExchangeOutcome,
    ) {
        let control = match ControlMessage::decode(&ism.payload) {
            Ok(control) => control,
            Err(err) => {
                warn!("[ism] Bad control frame from {}: {}", ism.origin, err);
                outcome.stats.control_failures += 1;
                return;
            }
        };

        match control {
            ControlMessage::ReplayRequest(request) => {
                if request.requesting_site != ism.origin {
                    warn!(
                        "[ism] Replay request names {} but was signed by {}",
                        request.requesting_site, ism.origin
                    );
                    outcome.stats.control_failures += 1;
                    return;
                }
                if !channel.response_channel {
                    debug!("[ism] No response channel to {}, replay skipped", channel.sender);
                    return;
                }
                match self.answer_replay(&request) {
                    Ok((messages, response)) => {
                        outcome.stats.replayed += messages.len() as u32;
                        outcome.replies.extend(messages);
                        outcome.replies.push(response);
                    }
                    Err(err) => {
                        warn!(
                            "[ism] Replay of {} for {} failed: {}",
                            request.target_origin, request.requesting_site, err
                        );
                        outcome.stats.control_failures += 1;
                    }
                }
            }
            ControlMessage::ReplayResponse(response) => {
                // Recorded against the replying site, keyed by the origin it can serve.
                match state.queues.get_mut(&ism.origin) {
                    Some(queue) => queue.set_gossip_hint(response.target_origin, response.remaining()),
                    None => debug!("[ism] Backlog hint from {} without a queue", ism.origin),
                }
            }
            ControlMessage::Unrecognized(kind) => {
                debug!("[ism] Ignoring control frame kind {} from {}", kind, ism.origin);
                outcome.stats.unrecognized_control += 1;
            }
        }
    }

    /// Selected archived messages plus the signed response frame.
    fn answer_replay(&self, request: &ReplayRequest) -> SequencerResult<(Vec<Vec<u8>>, Vec<u8>)> {
        let archive: Vec<ArchivedIsm> = self
            .store()
            .scan_archive(request.target_origin)?
            .into_iter()
            .filter_map(|encoded| match ArchivedIsm::from_encoded(encoded) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!("[ism] Skipping unreadable archive entry: {}", err);
                    None
                }
            })
            .collect();

        let selection = select_replay(archive, request, self.inner.config.max_replay_per_exchange);
        let response = ReplayResponse {
            target_origin: request.target_origin,
            matching: selection.matching,
            replayed: selection.messages.len() as u64,
        };
        debug!(
            "[ism] Replaying {}/{} messages of {} to {}",
            response.replayed, response.matching, request.target_origin, request.requesting_site
        );

        let frame = self.sign_control(
            request.requesting_site,
            &ControlMessage::ReplayResponse(response),
        )?;
        Ok((selection.messages, frame))
    }

    pub(super) fn replay_requests(
        &self,
        state: &SequencerState,
        destination: SiteId,
        targets: &[SiteId],
    ) -> SequencerResult<Vec<Vec<u8>>> {
        let local = self.credentials().local_site();

        targets
            .iter()
            .copied()
            .filter(|target| *target != local)
            .map(|target| {
                let (exclude_public_up_to, exclude_private_up_to) = state
                    .queues
                    .get(&target)
                    .map(|q| (q.watermark(Visibility::Public), q.watermark(Visibility::Private)))
                    .or_else(|| {
                        state
                            .sites
                            .get(&target)
                            .map(|s| (s.applied_public, s.applied_private))
                    })
                    .unwrap_or_default();

                let request = ReplayRequest {
                    requesting_site: local,
                    target_origin: target,
                    exclude_public_up_to,
                    exclude_private_up_to,
                    max_to_replay: self.inner.config.max_replay_per_exchange,
                };
                self.sign_control(destination, &ControlMessage::ReplayRequest(request))
            })
            .collect()
    }

    /// Wraps a control frame in a signed link-local ISM.
    fn sign_control(&self, destination: SiteId, control: &ControlMessage) -> SequencerResult<Vec<u8>> {
        let ism = Ism::link_local(self.credentials().local_site(), destination, control.encode()?);
        let body = encode_body(&ism)?;
        let signature = self.credentials().sign(&body);
        Ok(encode_signed(body, signature)?)
    }
}
