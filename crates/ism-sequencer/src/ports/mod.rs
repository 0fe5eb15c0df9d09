//! Ports layer - Hexagonal architecture interfaces.

pub mod inbound;
pub mod outbound;

pub use inbound::{ExchangeChannel, ExchangeOutcome, IsmExchangeApi, PeriodicReport, StuckDispatch};
pub use outbound::{
    CompletionSink, DispatchExecutor, DispatchJob, HeldMessageStore, IsmConsumer, NoOpObserver,
    SequencerObserver, SiteCredentials, SiteRoster, SystemTimeSource, TimeSource,
};
