//! # Sequencer Integration Tests
//!
//! Multi-node exchanges over the public API: replay between peers, recovery
//! from held messages, and online dispatch on a tokio runtime.

mod common;

use common::{chain, key, sign, Node};
use ism_sequencer::adapters::{InMemoryMessageStore, InlineExecutor, TokioExecutor};
use ism_sequencer::{DispatchStep, HeldMessageStore, IsmExchangeApi};
use shared_types::{ControlMessage, Ism, ReplayRequest, Routing, SiteId, Visibility};
use std::sync::Arc;
use std::time::Duration;

const HUB: SiteId = SiteId(10);
const REQUESTER: SiteId = SiteId(20);
const ORIGIN: SiteId = SiteId(30);

// =============================================================================
// REPLAY
// =============================================================================

fn hub_with_archive(count: u64) -> Node {
    let hub = Node::new(HUB, &[REQUESTER, ORIGIN]);
    for ism in chain(ORIGIN, count) {
        hub.store.archive(ism.key(), sign(&ism));
    }
    hub
}

#[test]
fn test_replay_fills_gap_from_peer() {
    let hub = hub_with_archive(8);
    let requester = Node::new(REQUESTER, &[HUB, ORIGIN]);
    requester.service.reset_site(ORIGIN, 2, 0).unwrap();

    let requests = requester
        .service
        .build_replay_requests(HUB, &[ORIGIN])
        .unwrap();
    assert_eq!(requests.len(), 1);

    let answer = hub.receive_raw(&requests);
    assert_eq!(answer.stats.link_local, 1);
    // Capped at five for tests, plus the response frame.
    assert_eq!(answer.stats.replayed, 5);
    assert_eq!(answer.replies.len(), 6);

    let applied = requester.receive_raw(&answer.replies);
    assert_eq!(applied.stats.admitted, 5);
    assert_eq!(applied.stats.link_local, 1);
    // The hub still holds one more of ORIGIN's messages for us.
    assert_eq!(requester.service.gossip_hint_total(HUB), 1);
    assert_eq!(requester.service.gossip_hint_total(ORIGIN), 0);

    requester.drain();
    assert_eq!(requester.consumer.applied_from(ORIGIN), vec![3, 4, 5, 6, 7]);
    assert_eq!(
        requester.roster.get(ORIGIN).unwrap().watermark(Visibility::Public),
        7
    );
}

#[test]
fn test_replay_skips_private_for_other_sites() {
    let hub = Node::new(HUB, &[REQUESTER, ORIGIN]);
    let for_requester = Ism::private(ORIGIN, REQUESTER, 1, 0, Routing::Repository);
    let for_hub = Ism::private(ORIGIN, HUB, 2, 1, Routing::Repository);
    hub.store.archive(for_requester.key(), sign(&for_requester));
    hub.store.archive(for_hub.key(), sign(&for_hub));

    let requester = Node::new(REQUESTER, &[HUB, ORIGIN]);
    let requests = requester
        .service
        .build_replay_requests(HUB, &[ORIGIN])
        .unwrap();
    let answer = hub.receive_raw(&requests);

    assert_eq!(answer.stats.replayed, 1);
    let received = requester.receive_raw(&answer.replies);
    assert_eq!(received.stats.admitted, 1);
}

#[test]
fn test_replay_request_for_another_requester_refused() {
    let hub = hub_with_archive(3);
    let forged = ControlMessage::ReplayRequest(ReplayRequest {
        requesting_site: ORIGIN,
        target_origin: ORIGIN,
        exclude_public_up_to: 0,
        exclude_private_up_to: 0,
        max_to_replay: 10,
    });
    let frame = Ism::link_local(REQUESTER, HUB, forged.encode().unwrap());

    let answer = hub.receive(&[frame]);
    assert_eq!(answer.stats.control_failures, 1);
    assert!(answer.replies.is_empty());
}

#[test]
fn test_no_requests_for_local_site() {
    let requester = Node::new(REQUESTER, &[HUB, ORIGIN]);
    let requests = requester
        .service
        .build_replay_requests(HUB, &[REQUESTER, ORIGIN, HUB])
        .unwrap();
    assert_eq!(requests.len(), 2);
}

#[test]
fn test_unknown_control_kind_counted() {
    let hub = Node::new(HUB, &[REQUESTER]);
    let frame = Ism::link_local(
        REQUESTER,
        HUB,
        ControlMessage::Unrecognized(77).encode().unwrap(),
    );

    let outcome = hub.receive(&[frame]);
    assert_eq!(outcome.stats.unrecognized_control, 1);
    assert_eq!(outcome.stats.control_failures, 0);
}

// =============================================================================
// RECOVERY
// =============================================================================

#[test]
fn test_recovery_readmits_held_messages() {
    let store = Arc::new(InMemoryMessageStore::new());
    for ism in chain(ORIGIN, 4).into_iter().rev() {
        store.write(ism.key(), &sign(&ism)).unwrap();
    }

    let node = Node::with_store(HUB, &[ORIGIN], store);
    assert_eq!(node.store.held_keys().len(), 4);

    node.drain();
    assert_eq!(node.consumer.applied_from(ORIGIN), vec![1, 2, 3, 4]);
    assert!(node.store.held_keys().is_empty());
}

#[test]
fn test_recovery_is_idempotent() {
    let node = Node::new(HUB, &[ORIGIN]);
    node.receive(&chain(ORIGIN, 3));

    let again = node.service.recover().unwrap();
    assert_eq!(again.admitted, 0);
    assert_eq!(again.duplicate, 3);

    node.drain();
    assert_eq!(node.consumer.applied_from(ORIGIN), vec![1, 2, 3]);
}

#[test]
fn test_bootstrap_never_dispatches_on_its_own() {
    let node = Node::new(HUB, &[ORIGIN]);
    node.receive(&chain(ORIGIN, 2));

    assert!(node.consumer.applied().is_empty());
    assert!(node.service.in_flight().is_none());
    assert_eq!(
        node.service.dispatch_one().unwrap(),
        DispatchStep::Completed {
            key: key(ORIGIN, 1),
            success: true
        }
    );
}

// =============================================================================
// ONLINE MODE
// =============================================================================

async fn wait_until_applied(node: &Node, expected: usize) {
    for _ in 0..400 {
        if node.consumer.applied().len() >= expected && node.service.in_flight().is_none() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "only {} of {} messages applied",
        node.consumer.applied().len(),
        expected
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_online_mode_applies_each_origin_in_order() {
    let other = SiteId(40);
    let node = Node::build(
        HUB,
        &[ORIGIN, other],
        Arc::new(InMemoryMessageStore::new()),
        Arc::new(InlineExecutor),
    );

    let mut messages = chain(ORIGIN, 6);
    messages.extend(chain(other, 6));
    messages.reverse();
    node.receive(&messages);

    node.service
        .go_online(Arc::new(TokioExecutor::current()))
        .unwrap();
    wait_until_applied(&node, 12).await;

    assert_eq!(node.consumer.applied_from(ORIGIN), vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(node.consumer.applied_from(other), vec![1, 2, 3, 4, 5, 6]);

    // Admissions after going online dispatch without being asked.
    node.receive(&[Ism::public(ORIGIN, 7, 6, Routing::Identifiers)]);
    wait_until_applied(&node, 13).await;
    assert_eq!(node.service.snapshot(ORIGIN).unwrap().applied_public, 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_online_round_robin_interleaves_origins() {
    let other = SiteId(40);
    let node = Node::build(
        HUB,
        &[ORIGIN, other],
        Arc::new(InMemoryMessageStore::new()),
        Arc::new(InlineExecutor),
    );
    let mut messages = chain(ORIGIN, 3);
    messages.extend(chain(other, 3));
    node.receive(&messages);

    node.service
        .go_online(Arc::new(TokioExecutor::current()))
        .unwrap();
    wait_until_applied(&node, 6).await;

    let origins: Vec<SiteId> = node.consumer.applied().iter().map(|k| k.origin).collect();
    assert_eq!(origins, vec![ORIGIN, other, ORIGIN, other, ORIGIN, other]);
}

