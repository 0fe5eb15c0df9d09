//! # Shared Types Crate
//!
//! Value types exchanged between sites and between the sequencer and the
//! downstream consumers: the inter-site message itself, the signed wire
//! envelope, link-local control frames and roster entries.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: every crate encodes and decodes ISMs through
//!   this crate.
//! - **Envelope Authority**: the origin named in a verified envelope is the
//!   only trusted identity; control payloads that repeat it are cross-checked.
//! - **Opaque Payloads**: nothing here interprets what a message *means*.

pub mod control;
pub mod errors;
pub mod ism;
pub mod site;
pub mod wire;

pub use control::{ControlFrame, ControlMessage, ReplayRequest, ReplayResponse};
pub use errors::WireError;
pub use ism::{
    CausalDependency, Ism, IsmKey, MessageKind, Routing, SeqNum, SiteId, Timestamp, Visibility,
    INVALID_SEQ_NUM, SITE_ID_MODULUS,
};
pub use site::{SitePublicKey, SiteRecord, SiteStatus};
pub use wire::{decode_trusted, decode_unverified, encode_body, encode_signed, UnverifiedIsm, WireIsm};
