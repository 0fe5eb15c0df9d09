//! # Node Runtime Library
//!
//! Everything a site node needs around the sequencer: configuration,
//! filesystem-backed storage, the data directory lock and the local
//! consumers. The `site-node` binary in `main.rs` drives it.
//!
//! ## Layout
//!
//! - `config` - `NodeConfig` from TOML and `SM_*` environment variables
//! - `adapters` - `HeldMessageStore` and `SiteRoster` on the filesystem
//! - `handlers` - downstream consumers
//! - `node` - assembly and lifecycle

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod node;

pub use config::{ConfigError, NodeConfig};
pub use node::{BootstrapReport, NodeService, SiteNode};
