//! # Adapters Layer (Hexagonal Architecture)
//!
//! Filesystem implementations of the sequencer's storage ports, plus the
//! lock that keeps a data directory to one process.

mod fs_roster;
mod fs_store;
mod lock;

pub use fs_roster::FsSiteRoster;
pub use fs_store::FsMessageStore;
pub use lock::{DataDirLock, LockError};
