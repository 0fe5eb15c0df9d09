//! # Admission Checks
//!
//! Suitability rules applied to every authenticated, non-link-local message
//! before it is persisted and queued, plus the per-exchange counters that
//! are logged as one summary line.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. too old (at or below the watermark of its visibility)
//! 2. authored by the local site
//! 3. private and addressed elsewhere
//! 4. origin deactivating past its final sequence number, or inactive

use crate::domain::site_queue::SiteQueue;
use crate::error::AdmissionError;
use serde::Serialize;
use shared_types::{Ism, SiteId, SiteRecord, SiteStatus};
use std::fmt;

/// Why an authenticated message was dropped during admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// Already covered by the watermark.
    TooOld,
    /// Our own message echoed back.
    LocalOrigin,
    /// Private message for another site.
    NotAddressedToLocal,
    /// Origin is leaving or gone.
    FromDeactivatedSite,
    /// Already pending or in flight.
    Duplicate,
}

/// Applies the suitability rules to `ism`.
///
/// `queue` is the origin's queue state; when present its watermarks are
/// authoritative over the roster entry.
pub fn check_suitability(
    ism: &Ism,
    local_site: SiteId,
    site: &SiteRecord,
    queue: Option<&SiteQueue>,
) -> Result<(), DropReason> {
    let watermark = queue
        .map(|q| q.watermark(ism.visibility))
        .unwrap_or_else(|| site.watermark(ism.visibility));
    if ism.seq_num <= watermark {
        return Err(DropReason::TooOld);
    }

    if ism.origin == local_site {
        return Err(DropReason::LocalOrigin);
    }

    if !ism.is_addressed_to(local_site) {
        return Err(DropReason::NotAddressedToLocal);
    }

    match site.status {
        SiteStatus::Inactive => return Err(DropReason::FromDeactivatedSite),
        SiteStatus::Deactivating { final_seq_num } if ism.seq_num > final_seq_num => {
            return Err(DropReason::FromDeactivatedSite)
        }
        _ => {}
    }

    // Participating but no queue: the directory and queue map disagree,
    // which only happens mid-deactivation.
    if queue.is_none() {
        return Err(DropReason::FromDeactivatedSite);
    }

    Ok(())
}

/// Counters for one admission batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AdmissionStats {
    pub received: u32,
    pub admitted: u32,
    pub duplicate: u32,
    pub too_old: u32,
    pub local_origin: u32,
    pub not_addressed: u32,
    pub from_deactivated: u32,
    pub unknown_sender: u32,
    pub bad_signature: u32,
    pub parse_error: u32,
    /// Link-local control messages handled.
    pub link_local: u32,
    /// Link-local control messages skipped because the channel forbids them.
    pub link_local_ignored: u32,
    pub unrecognized_control: u32,
    pub control_failures: u32,
    /// Messages returned to the peer in reply to replay requests.
    pub replayed: u32,
}

impl AdmissionStats {
    pub fn record_drop(&mut self, reason: DropReason) {
        match reason {
            DropReason::TooOld => self.too_old += 1,
            DropReason::LocalOrigin => self.local_origin += 1,
            DropReason::NotAddressedToLocal => self.not_addressed += 1,
            DropReason::FromDeactivatedSite => self.from_deactivated += 1,
            DropReason::Duplicate => self.duplicate += 1,
        }
    }

    pub fn record_error(&mut self, error: &AdmissionError) {
        match error {
            AdmissionError::UnknownSender(_) => self.unknown_sender += 1,
            AdmissionError::BadSignature(_) => self.bad_signature += 1,
            AdmissionError::Parse(_) => self.parse_error += 1,
        }
    }

    /// Suitability drops, duplicates included.
    pub fn dropped(&self) -> u32 {
        self.duplicate + self.too_old + self.local_origin + self.not_addressed + self.from_deactivated
    }

    /// Authentication and decoding failures.
    pub fn rejected(&self) -> u32 {
        self.unknown_sender + self.bad_signature + self.parse_error
    }

    /// True when nothing worth a log line happened.
    pub fn is_quiet(&self) -> bool {
        self.received == 0
    }
}

impl fmt::Display for AdmissionStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} admitted={}",
            self.received, self.admitted
        )?;
        let extras = [
            ("duplicate", self.duplicate),
            ("too_old", self.too_old),
            ("local_origin", self.local_origin),
            ("not_addressed", self.not_addressed),
            ("from_deactivated", self.from_deactivated),
            ("unknown_sender", self.unknown_sender),
            ("bad_signature", self.bad_signature),
            ("parse_error", self.parse_error),
            ("link_local", self.link_local),
            ("link_local_ignored", self.link_local_ignored),
            ("unrecognized_control", self.unrecognized_control),
            ("control_failures", self.control_failures),
            ("replayed", self.replayed),
        ];
        for (name, count) in extras.iter().filter(|(_, count)| *count > 0) {
            write!(f, " {name}={count}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Routing;

    const LOCAL: SiteId = SiteId(1);
    const REMOTE: SiteId = SiteId(2);

    fn record() -> SiteRecord {
        SiteRecord::active(REMOTE, [0; 32]).with_watermarks(5, 2)
    }

    fn queue() -> SiteQueue {
        SiteQueue::from_record(&record())
    }

    #[test]
    fn test_suitable_message_passes() {
        let ism = Ism::public(REMOTE, 6, 5, Routing::Membership);
        assert_eq!(check_suitability(&ism, LOCAL, &record(), Some(&queue())), Ok(()));
    }

    #[test]
    fn test_too_old_uses_visibility_watermark() {
        let public = Ism::public(REMOTE, 5, 4, Routing::Membership);
        let private = Ism::private(REMOTE, LOCAL, 3, 2, Routing::Membership);
        assert_eq!(
            check_suitability(&public, LOCAL, &record(), Some(&queue())),
            Err(DropReason::TooOld)
        );
        assert_eq!(check_suitability(&private, LOCAL, &record(), Some(&queue())), Ok(()));
    }

    #[test]
    fn test_too_old_checked_before_other_rules() {
        let ism = Ism::private(REMOTE, SiteId(9), 1, 0, Routing::Membership);
        assert_eq!(
            check_suitability(&ism, LOCAL, &record(), Some(&queue())),
            Err(DropReason::TooOld)
        );
    }

    #[test]
    fn test_local_origin_dropped() {
        let local = SiteRecord::active(LOCAL, [0; 32]);
        let ism = Ism::public(LOCAL, 1, 0, Routing::Membership);
        assert_eq!(
            check_suitability(&ism, LOCAL, &local, None),
            Err(DropReason::LocalOrigin)
        );
    }

    #[test]
    fn test_private_for_other_site_dropped() {
        let ism = Ism::private(REMOTE, SiteId(9), 3, 2, Routing::Membership);
        assert_eq!(
            check_suitability(&ism, LOCAL, &record(), Some(&queue())),
            Err(DropReason::NotAddressedToLocal)
        );
    }

    #[test]
    fn test_past_final_seq_dropped() {
        let mut site = record();
        site.status = SiteStatus::Deactivating { final_seq_num: 7 };

        let last = Ism::public(REMOTE, 7, 6, Routing::Membership);
        let beyond = Ism::public(REMOTE, 8, 7, Routing::Membership);
        assert_eq!(check_suitability(&last, LOCAL, &site, Some(&queue())), Ok(()));
        assert_eq!(
            check_suitability(&beyond, LOCAL, &site, Some(&queue())),
            Err(DropReason::FromDeactivatedSite)
        );
    }

    #[test]
    fn test_inactive_site_dropped() {
        let mut site = record();
        site.status = SiteStatus::Inactive;
        let ism = Ism::public(REMOTE, 6, 5, Routing::Membership);
        assert_eq!(
            check_suitability(&ism, LOCAL, &site, None),
            Err(DropReason::FromDeactivatedSite)
        );
    }

    #[test]
    fn test_summary_lists_nonzero_counters() {
        let mut stats = AdmissionStats {
            received: 4,
            admitted: 2,
            ..Default::default()
        };
        stats.record_drop(DropReason::Duplicate);
        stats.record_error(&AdmissionError::BadSignature(REMOTE));

        assert_eq!(
            stats.to_string(),
            "received=4 admitted=2 duplicate=1 bad_signature=1"
        );
        assert_eq!(stats.dropped(), 1);
        assert_eq!(stats.rejected(), 1);
    }
}
