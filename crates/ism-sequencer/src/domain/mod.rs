//! Domain layer: pure ordering and admission logic, no I/O.

pub mod admission;
pub mod completion;
pub mod dispatch;
pub mod replay;
pub mod site_queue;

pub use admission::{check_suitability, AdmissionStats, DropReason};
pub use completion::{CompletionActions, CompletionRecord, ProcessingOutcome};
pub use dispatch::{round_robin_order, DispatchStep, DispatchedIsm, InFlight};
pub use replay::{select_replay, ArchivedIsm, ReplaySelection};
pub use site_queue::{EnqueueOutcome, ForeignUnblock, QueueSnapshot, SiteQueue};
