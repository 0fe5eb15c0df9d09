//! Property tests: whatever order and batching messages arrive in, each
//! origin's messages are applied exactly once and gap-free.

mod common;

use common::{chain, sign, Node};
use ism_sequencer::IsmExchangeApi;
use proptest::prelude::*;
use shared_types::{Ism, SiteId};

const LOCAL: SiteId = SiteId(1);
const A: SiteId = SiteId(2);
const B: SiteId = SiteId(3);

/// Messages of two origins in arbitrary order, some delivered twice.
fn deliveries() -> impl Strategy<Value = (Vec<Ism>, usize)> {
    (1u64..12, 1u64..12, 0usize..6, 1usize..5)
        .prop_flat_map(|(a, b, dupes, batch)| {
            let mut all = chain(A, a);
            all.extend(chain(B, b));
            let repeated: Vec<Ism> = all.iter().take(dupes).cloned().collect();
            all.extend(repeated);
            (Just(all).prop_shuffle(), Just(batch))
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_arrival_order_never_changes_application_order((messages, batch) in deliveries()) {
        let node = Node::new(LOCAL, &[A, B]);
        let expected_a = messages.iter().filter(|m| m.origin == A).map(|m| m.seq_num).max().unwrap_or(0);
        let expected_b = messages.iter().filter(|m| m.origin == B).map(|m| m.seq_num).max().unwrap_or(0);

        for chunk in messages.chunks(batch) {
            let encoded: Vec<Vec<u8>> = chunk.iter().map(sign).collect();
            node.receive_raw(&encoded);
            // Interleave partial draining with arrivals.
            prop_assert!(node.service.dispatch_one().is_ok());
        }
        node.drain();

        prop_assert_eq!(node.consumer.applied_from(A), (1..=expected_a).collect::<Vec<_>>());
        prop_assert_eq!(node.consumer.applied_from(B), (1..=expected_b).collect::<Vec<_>>());
        prop_assert!(node.store.held_keys().is_empty());
    }
}
