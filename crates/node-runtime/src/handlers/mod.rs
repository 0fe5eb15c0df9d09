//! # Consumers
//!
//! Downstream consumers the node routes dispatched messages to.

mod logging_consumer;

pub use logging_consumer::LoggingConsumer;
