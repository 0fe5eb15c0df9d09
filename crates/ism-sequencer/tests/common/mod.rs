//! Shared helpers for sequencer integration tests.

#![allow(dead_code)]

use ism_sequencer::adapters::{
    ConsumerSet, Ed25519Credentials, InMemoryMessageStore, InMemorySiteRoster, InlineExecutor,
};
use ism_sequencer::domain::DispatchedIsm;
use ism_sequencer::{
    DispatchExecutor, ExchangeChannel, ExchangeOutcome, IsmConsumer, IsmExchangeApi,
    ProcessingOutcome, SequencerConfig, SequencerPorts, SequencerService,
};
use parking_lot::Mutex;
use shared_crypto::SiteSigningKey;
use shared_types::{encode_body, encode_signed, Ism, IsmKey, Routing, SiteId, SiteRecord};
use std::sync::Arc;

pub type Service = SequencerService<InMemoryMessageStore, InMemorySiteRoster, Ed25519Credentials>;

pub fn key_for(site: SiteId) -> SiteSigningKey {
    SiteSigningKey::from_seed([site.get() as u8; 32])
}

pub fn record_for(site: SiteId) -> SiteRecord {
    SiteRecord::active(site, *key_for(site).verifying_key().as_bytes())
}

pub fn sign(ism: &Ism) -> Vec<u8> {
    let body = encode_body(ism).expect("encode body");
    let signature = key_for(ism.origin).sign(&body);
    encode_signed(body, signature).expect("encode envelope")
}

/// A public chain from `origin`: seq 1..=n, each linked to its predecessor.
pub fn chain(origin: SiteId, n: u64) -> Vec<Ism> {
    (1..=n)
        .map(|seq| Ism::public(origin, seq, seq - 1, Routing::Repository))
        .collect()
}

pub fn key(origin: SiteId, seq_num: u64) -> IsmKey {
    IsmKey { origin, seq_num }
}

/// Consumer that records what it applied.
#[derive(Default)]
pub struct RecordingConsumer {
    applied: Mutex<Vec<IsmKey>>,
}

impl RecordingConsumer {
    pub fn applied(&self) -> Vec<IsmKey> {
        self.applied.lock().clone()
    }

    pub fn applied_from(&self, origin: SiteId) -> Vec<u64> {
        self.applied
            .lock()
            .iter()
            .filter(|key| key.origin == origin)
            .map(|key| key.seq_num)
            .collect()
    }
}

impl IsmConsumer for RecordingConsumer {
    fn consume(&self, dispatched: &DispatchedIsm) -> ProcessingOutcome {
        self.applied.lock().push(dispatched.ism.key());
        ProcessingOutcome::applied()
    }
}

/// One site's sequencer with in-memory adapters.
pub struct Node {
    pub site: SiteId,
    pub service: Service,
    pub store: Arc<InMemoryMessageStore>,
    pub roster: Arc<InMemorySiteRoster>,
    pub consumer: Arc<RecordingConsumer>,
}

impl Node {
    /// Bootstrap-mode node that knows `peers` and itself.
    pub fn new(site: SiteId, peers: &[SiteId]) -> Self {
        Self::with_store(site, peers, Arc::new(InMemoryMessageStore::new()))
    }

    pub fn with_store(site: SiteId, peers: &[SiteId], store: Arc<InMemoryMessageStore>) -> Self {
        Self::build(site, peers, store, Arc::new(InlineExecutor))
    }

    pub fn build(
        site: SiteId,
        peers: &[SiteId],
        store: Arc<InMemoryMessageStore>,
        executor: Arc<dyn DispatchExecutor>,
    ) -> Self {
        let roster = Arc::new(InMemorySiteRoster::with_sites(
            std::iter::once(site).chain(peers.iter().copied()).map(record_for),
        ));
        let consumer = Arc::new(RecordingConsumer::default());
        let ports = SequencerPorts::new(
            store.clone(),
            roster.clone(),
            Arc::new(Ed25519Credentials::new(site, key_for(site))),
            ConsumerSet::uniform(consumer.clone()),
        );
        let service = SequencerService::new(SequencerConfig::for_testing(), ports, executor);
        service.recover().expect("recover");

        Self {
            site,
            service,
            store,
            roster,
            consumer,
        }
    }

    pub fn receive(&self, messages: &[Ism]) -> ExchangeOutcome {
        let batch: Vec<Vec<u8>> = messages.iter().map(sign).collect();
        self.receive_raw(&batch)
    }

    pub fn receive_raw(&self, batch: &[Vec<u8>]) -> ExchangeOutcome {
        self.service
            .exchange(batch, &ExchangeChannel::peer("peer"))
            .expect("exchange")
    }

    pub fn drain(&self) {
        while self
            .service
            .dispatch_one()
            .expect("dispatch")
            .completed_inline()
        {}
    }
}
