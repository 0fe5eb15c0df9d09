//! # Error Types
//!
//! Errors shared by every crate that touches the ISM wire format.

use thiserror::Error;

/// Wire encoding and decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Bytes do not decode into an envelope or message.
    #[error("Malformed message: {0}")]
    Malformed(String),

    /// Envelope version not supported by this build.
    #[error("Unsupported version: received {received}, supported {supported}")]
    UnsupportedVersion { received: u16, supported: u16 },

    /// Serialization failed.
    #[error("Encoding failed: {0}")]
    Encode(String),
}
