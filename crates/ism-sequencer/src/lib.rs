//! # ism-sequencer
//!
//! Reception, causal ordering and dispatch of inter-site messages (ISMs).
//!
//! ## Overview
//!
//! Every site in the mesh emits a totally ordered stream of signed messages.
//! This crate receives those streams from peers in arbitrary order, with
//! duplicates and gaps, and hands each message to exactly one consumer in
//! the order its origin produced it:
//!
//! - **Admission**: signature check, suitability filters, durable hold
//! - **Per-site queues**: gap detection via `prev_seq_num`, failure blocking
//! - **Dispatch**: one message in flight across all origins, round-robin
//! - **Completion**: consumer-selected lifecycle steps, cross-origin unblock
//! - **Replay**: peers ask each other for missing messages over link-local
//!   control frames
//! - **Recovery**: held messages are re-admitted at start-up and periodically
//!
//! ## Architecture
//!
//! ```text
//! transport ──exchange──→ SequencerService ──DispatchExecutor──→ IsmConsumer
//!                            │      ↑                               │
//!              HeldMessageStore     └────────── complete ───────────┘
//!              SiteRoster
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use ism_sequencer::{SequencerService, SequencerConfig, SequencerPorts};
//! use ism_sequencer::adapters::{InlineExecutor, TokioExecutor};
//! use ism_sequencer::ports::IsmExchangeApi;
//!
//! let service = SequencerService::new(config, ports, Arc::new(InlineExecutor));
//! service.recover()?;
//! while service.dispatch_one()?.completed_inline() {}
//! service.go_online(Arc::new(TokioExecutor::current()))?;
//!
//! let outcome = service.exchange(&batch, &ExchangeChannel::peer("site-4"))?;
//! ```

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod service;

pub use config::SequencerConfig;
pub use domain::{
    AdmissionStats, CompletionActions, CompletionRecord, DispatchStep, DispatchedIsm, DropReason,
    ProcessingOutcome, QueueSnapshot,
};
pub use error::{AdmissionError, SequencerError, SequencerResult, StoreError};
pub use ports::inbound::{
    ExchangeChannel, ExchangeOutcome, IsmExchangeApi, PeriodicReport, StuckDispatch,
};
pub use ports::outbound::{
    CompletionSink, DispatchExecutor, HeldMessageStore, IsmConsumer, SequencerObserver,
    SiteCredentials, SiteRoster, TimeSource,
};
pub use service::{SequencerPorts, SequencerService};
