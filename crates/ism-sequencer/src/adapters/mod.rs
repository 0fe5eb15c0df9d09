//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implementations of the outbound ports that ship with the crate. The node
//! runtime adds filesystem-backed store and roster adapters.

mod consumers;
mod credentials;
mod executor;
mod memory;

pub use consumers::{AcceptAllConsumer, ConsumerSet};
pub use credentials::Ed25519Credentials;
pub use executor::{InlineExecutor, TokioExecutor};
pub use memory::{InMemoryMessageStore, InMemorySiteRoster};
