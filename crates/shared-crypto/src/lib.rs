//! # Shared Crypto - Site Signatures
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `signatures` | Ed25519 | Signing and verifying inter-site messages |
//!
//! The sequencer treats these primitives as a black box behind its
//! `SiteCredentials` port; this crate is the production implementation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod errors;
pub mod signatures;

pub use errors::CryptoError;
pub use signatures::{SiteSigningKey, SiteVerifyingKey};
