//! # Per-Site Queue
//!
//! Ordering state for one remote origin: the two applied watermarks, the
//! pending messages ordered by sequence number, and the single message of
//! this origin currently being processed.
//!
//! ## Eligibility
//!
//! ```text
//! pending: [seq 3 prev 2] [seq 7 prev 3] [seq 9 prev 7]
//!              │
//!              └── eligible iff !head_blocked && prev == watermark(visibility)
//! ```
//!
//! Only the head is ever considered. A failed head blocks the queue until
//! another origin completes a message or a new head arrives.

use serde::Serialize;
use shared_types::{Ism, SeqNum, SiteId, SiteRecord, Visibility};
use std::collections::{BTreeMap, BTreeSet};

/// Result of [`SiteQueue::enqueue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Added to the pending set.
    Queued,
    /// Already pending or in flight.
    Duplicate,
}

/// Result of [`SiteQueue::notify_foreign_completion`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForeignUnblock {
    /// The head was not blocked.
    NotBlocked,
    /// The head's declared dependency is now satisfied.
    DependencySatisfied,
    /// Unblocked without a satisfied dependency; the head gets another try.
    Optimistic,
    /// Strict mode and the dependency is still open.
    StillBlocked,
}

/// Ordering state for one origin.
#[derive(Clone, Debug)]
pub struct SiteQueue {
    site_id: SiteId,
    applied_public: SeqNum,
    applied_private: SeqNum,
    pending: BTreeSet<Ism>,
    head_blocked: bool,
    in_flight: Option<Ism>,
    /// Approximate backlog this site reported it can replay, by origin.
    gossip_hints: BTreeMap<SiteId, u64>,
}

impl SiteQueue {
    /// Creates an empty queue seeded with durable watermarks.
    pub fn new(site_id: SiteId, applied_public: SeqNum, applied_private: SeqNum) -> Self {
        Self {
            site_id,
            applied_public,
            applied_private,
            pending: BTreeSet::new(),
            head_blocked: false,
            in_flight: None,
            gossip_hints: BTreeMap::new(),
        }
    }

    /// Creates a queue from a roster entry.
    pub fn from_record(record: &SiteRecord) -> Self {
        Self::new(record.site_id, record.applied_public, record.applied_private)
    }

    pub fn site_id(&self) -> SiteId {
        self.site_id
    }

    /// Highest applied sequence number for `visibility`.
    pub fn watermark(&self, visibility: Visibility) -> SeqNum {
        match visibility {
            Visibility::Public => self.applied_public,
            Visibility::Private => self.applied_private,
        }
    }

    fn watermark_mut(&mut self, visibility: Visibility) -> &mut SeqNum {
        match visibility {
            Visibility::Public => &mut self.applied_public,
            Visibility::Private => &mut self.applied_private,
        }
    }

    /// Lowest-sequence pending message.
    pub fn head(&self) -> Option<&Ism> {
        self.pending.first()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_head_blocked(&self) -> bool {
        self.head_blocked
    }

    pub fn in_flight(&self) -> Option<&Ism> {
        self.in_flight.as_ref()
    }

    /// True when `ism` is pending or in flight.
    pub fn contains(&self, ism: &Ism) -> bool {
        self.in_flight.as_ref() == Some(ism) || self.pending.contains(ism)
    }

    /// Adds a message to the pending set.
    ///
    /// A message that becomes the new head clears the blocked flag.
    pub fn enqueue(&mut self, ism: Ism) -> EnqueueOutcome {
        if self.contains(&ism) {
            return EnqueueOutcome::Duplicate;
        }

        let becomes_head = self.pending.first().map_or(true, |head| ism < *head);
        self.pending.insert(ism);
        if becomes_head {
            self.head_blocked = false;
        }
        EnqueueOutcome::Queued
    }

    /// The head, if it may be dispatched now.
    pub fn next_eligible(&self) -> Option<&Ism> {
        if self.head_blocked {
            return None;
        }
        self.pending
            .first()
            .filter(|head| head.prev_seq_num == self.watermark(head.visibility))
    }

    /// Moves the eligible head into the in-flight slot.
    ///
    /// Returns `None` if this origin already has a message in flight or the
    /// head is not eligible.
    pub fn take_for_processing(&mut self) -> Option<Ism> {
        if self.in_flight.is_some() || self.next_eligible().is_none() {
            return None;
        }
        let ism = self.pending.pop_first()?;
        self.in_flight = Some(ism.clone());
        Some(ism)
    }

    /// Clears the in-flight slot without touching pending or watermarks.
    pub fn release(&mut self, ism: &Ism) -> bool {
        if self.in_flight.as_ref() == Some(ism) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }

    /// Records the outcome of processing `ism`.
    ///
    /// Success advances the watermark (never backwards) and prunes pending
    /// entries it made stale. Failure puts the message back and blocks the
    /// head.
    pub fn complete(&mut self, ism: &Ism, success: bool) {
        self.release(ism);
        if success {
            let watermark = self.watermark_mut(ism.visibility);
            *watermark = (*watermark).max(ism.seq_num);
            self.head_blocked = false;
            self.prune_stale();
        } else {
            self.pending.insert(ism.clone());
            self.head_blocked = true;
        }
    }

    /// Puts `ism` back without blocking the head.
    pub fn revert(&mut self, ism: &Ism) {
        self.release(ism);
        if ism.seq_num > self.watermark(ism.visibility) {
            self.pending.insert(ism.clone());
        }
    }

    /// Another origin completed `foreign`; maybe unblock our head.
    ///
    /// Permissive mode unblocks unconditionally so the head is retried.
    pub fn notify_foreign_completion(&mut self, foreign: &Ism, strict: bool) -> ForeignUnblock {
        if !self.head_blocked {
            return ForeignUnblock::NotBlocked;
        }

        let satisfied = self
            .pending
            .first()
            .and_then(|head| head.kind.awaits())
            .map_or(false, |dep| dep.is_satisfied_by(foreign));

        if satisfied {
            self.head_blocked = false;
            ForeignUnblock::DependencySatisfied
        } else if strict {
            ForeignUnblock::StillBlocked
        } else {
            self.head_blocked = false;
            ForeignUnblock::Optimistic
        }
    }

    /// Drops pending messages past `final_seq_num`. Returns how many.
    pub fn truncate_after(&mut self, final_seq_num: SeqNum) -> usize {
        let before = self.pending.len();
        let head_dropped = self
            .pending
            .first()
            .map_or(false, |head| head.seq_num > final_seq_num);

        self.pending.retain(|ism| ism.seq_num <= final_seq_num);
        if head_dropped {
            self.head_blocked = false;
        }
        before - self.pending.len()
    }

    /// Overwrites both watermarks and discards what they made stale.
    pub fn reset_watermarks(&mut self, applied_public: SeqNum, applied_private: SeqNum) {
        self.applied_public = applied_public;
        self.applied_private = applied_private;
        self.head_blocked = false;
        self.prune_stale();
    }

    /// Messages are waiting but none can be dispatched.
    pub fn is_stalled(&self) -> bool {
        self.in_flight.is_none() && !self.pending.is_empty() && self.next_eligible().is_none()
    }

    /// Records how many of `origin`'s messages this site still has for us.
    /// Zero clears it.
    pub fn set_gossip_hint(&mut self, origin: SiteId, remaining: u64) {
        if remaining == 0 {
            self.gossip_hints.remove(&origin);
        } else {
            self.gossip_hints.insert(origin, remaining);
        }
    }

    /// Sum of all recorded backlog hints.
    pub fn gossip_hint_total(&self) -> u64 {
        self.gossip_hints.values().copied().fold(0, u64::saturating_add)
    }

    /// Read-only view for diagnostics.
    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            site_id: self.site_id,
            applied_public: self.applied_public,
            applied_private: self.applied_private,
            pending: self.pending.iter().map(|ism| ism.seq_num).collect(),
            head_blocked: self.head_blocked,
            in_flight: self.in_flight.as_ref().map(|ism| ism.seq_num),
            gossip_hint_total: self.gossip_hint_total(),
        }
    }

    fn prune_stale(&mut self) {
        let (public, private) = (self.applied_public, self.applied_private);
        self.pending.retain(|ism| match ism.visibility {
            Visibility::Public => ism.seq_num > public,
            Visibility::Private => ism.seq_num > private,
        });
    }
}

/// Serializable view of one queue.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueSnapshot {
    pub site_id: SiteId,
    pub applied_public: SeqNum,
    pub applied_private: SeqNum,
    /// Pending sequence numbers in dispatch order.
    pub pending: Vec<SeqNum>,
    pub head_blocked: bool,
    pub in_flight: Option<SeqNum>,
    pub gossip_hint_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{CausalDependency, MessageKind, Routing};

    const A: SiteId = SiteId(1);

    fn public(seq: SeqNum, prev: SeqNum) -> Ism {
        Ism::public(A, seq, prev, Routing::Membership)
    }

    #[test]
    fn test_gap_holds_until_predecessor_applied() {
        let mut queue = SiteQueue::new(A, 0, 0);
        queue.enqueue(public(2, 1));
        assert!(queue.next_eligible().is_none());

        queue.enqueue(public(1, 0));
        let first = queue.take_for_processing().unwrap();
        assert_eq!(first.seq_num, 1);
        queue.complete(&first, true);

        let second = queue.take_for_processing().unwrap();
        assert_eq!(second.seq_num, 2);
        queue.complete(&second, true);
        assert_eq!(queue.watermark(Visibility::Public), 2);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_visibilities_tracked_separately() {
        let mut queue = SiteQueue::new(A, 4, 0);
        queue.enqueue(Ism::private(A, SiteId(2), 5, 0, Routing::Repository));

        let ism = queue.take_for_processing().unwrap();
        queue.complete(&ism, true);
        assert_eq!(queue.watermark(Visibility::Private), 5);
        assert_eq!(queue.watermark(Visibility::Public), 4);
    }

    #[test]
    fn test_duplicate_pending_and_in_flight() {
        let mut queue = SiteQueue::new(A, 0, 0);
        assert_eq!(queue.enqueue(public(1, 0)), EnqueueOutcome::Queued);
        assert_eq!(queue.enqueue(public(1, 0)), EnqueueOutcome::Duplicate);

        queue.take_for_processing().unwrap();
        assert_eq!(queue.enqueue(public(1, 0)), EnqueueOutcome::Duplicate);
    }

    #[test]
    fn test_failure_blocks_until_foreign_completion() {
        let mut queue = SiteQueue::new(A, 0, 0);
        queue.enqueue(public(1, 0));
        let ism = queue.take_for_processing().unwrap();
        queue.complete(&ism, false);

        assert!(queue.is_head_blocked());
        assert!(queue.next_eligible().is_none());
        assert!(queue.is_stalled());

        let foreign = Ism::public(SiteId(2), 1, 0, Routing::Membership);
        assert_eq!(
            queue.notify_foreign_completion(&foreign, false),
            ForeignUnblock::Optimistic
        );
        assert_eq!(queue.next_eligible().map(|m| m.seq_num), Some(1));
    }

    #[test]
    fn test_strict_unblock_waits_for_dependency() {
        let sponsor = SiteId(3);
        let mut queue = SiteQueue::new(A, 0, 0);
        queue.enqueue(public(1, 0).with_kind(MessageKind::AwaitSite(CausalDependency {
            site: sponsor,
            seq_num: 4,
        })));
        let ism = queue.take_for_processing().unwrap();
        queue.complete(&ism, false);

        let unrelated = Ism::public(SiteId(9), 4, 3, Routing::Membership);
        assert_eq!(
            queue.notify_foreign_completion(&unrelated, true),
            ForeignUnblock::StillBlocked
        );

        let approval = Ism::public(sponsor, 4, 3, Routing::Membership);
        assert_eq!(
            queue.notify_foreign_completion(&approval, true),
            ForeignUnblock::DependencySatisfied
        );
        assert!(!queue.is_head_blocked());
    }

    #[test]
    fn test_new_head_clears_block() {
        let mut queue = SiteQueue::new(A, 0, 0);
        queue.enqueue(public(2, 0));
        let ism = queue.take_for_processing().unwrap();
        queue.complete(&ism, false);
        assert!(queue.is_head_blocked());

        // Arrives behind the blocked head: still blocked.
        queue.enqueue(public(3, 2));
        assert!(queue.is_head_blocked());

        queue.enqueue(public(1, 0));
        assert!(!queue.is_head_blocked());
    }

    #[test]
    fn test_revert_keeps_head_unblocked() {
        let mut queue = SiteQueue::new(A, 0, 0);
        queue.enqueue(public(1, 0));
        let ism = queue.take_for_processing().unwrap();
        queue.revert(&ism);

        assert!(queue.in_flight().is_none());
        assert_eq!(queue.next_eligible().map(|m| m.seq_num), Some(1));
    }

    #[test]
    fn test_success_prunes_stale_entries() {
        let mut queue = SiteQueue::new(A, 0, 0);
        queue.enqueue(public(1, 0));
        // Replayed copy of a message another path will cover.
        let ism = queue.take_for_processing().unwrap();
        queue.enqueue(public(1, 0).with_payload(vec![9]));

        queue.complete(&ism, true);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn test_truncate_after_final() {
        let mut queue = SiteQueue::new(A, 0, 0);
        for (seq, prev) in [(1, 0), (2, 1), (3, 2), (4, 3)] {
            queue.enqueue(public(seq, prev));
        }
        assert_eq!(queue.truncate_after(2), 2);
        assert_eq!(queue.snapshot().pending, vec![1, 2]);
    }

    #[test]
    fn test_truncate_dropping_blocked_head_unblocks() {
        let mut queue = SiteQueue::new(A, 5, 0);
        queue.enqueue(public(7, 5));
        let ism = queue.take_for_processing().unwrap();
        queue.complete(&ism, false);

        queue.truncate_after(6);
        assert!(!queue.is_head_blocked());
        assert!(!queue.is_stalled());
    }

    #[test]
    fn test_reset_watermarks_rebases() {
        let mut queue = SiteQueue::new(A, 0, 0);
        queue.enqueue(public(3, 2));
        queue.enqueue(public(11, 10));
        assert!(queue.next_eligible().is_none());

        queue.reset_watermarks(10, 0);
        assert_eq!(queue.snapshot().pending, vec![11]);
        assert_eq!(queue.next_eligible().map(|m| m.seq_num), Some(11));
    }

    #[test]
    fn test_gossip_hints() {
        let mut queue = SiteQueue::new(A, 0, 0);
        queue.set_gossip_hint(SiteId(2), 40);
        queue.set_gossip_hint(SiteId(3), 2);
        assert_eq!(queue.gossip_hint_total(), 42);

        queue.set_gossip_hint(SiteId(2), 0);
        assert_eq!(queue.gossip_hint_total(), 2);
    }
}
