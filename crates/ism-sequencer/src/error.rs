//! Error types for the sequencer.

use shared_types::{IsmKey, SiteId, WireError};
use thiserror::Error;

/// Failure reported by a durable store adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Underlying I/O failed.
    #[error("Store I/O error: {0}")]
    Io(String),

    /// A persisted entry could not be read back.
    #[error("Corrupt store entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// The roster has no entry for the site.
    #[error("Site not in roster: {0}")]
    UnknownSite(SiteId),
}

/// Per-message authentication failure. Never aborts an exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// Origin is not in the site directory.
    #[error("Unknown sender: {0}")]
    UnknownSender(SiteId),

    /// Signature does not verify against the origin's registered key.
    #[error("Bad signature from {0}")]
    BadSignature(SiteId),

    /// The envelope or body could not be decoded.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<WireError> for AdmissionError {
    fn from(err: WireError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Sequencer errors surfaced to callers.
#[derive(Debug, Error)]
pub enum SequencerError {
    /// Durable state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A completion arrived for a message that is not in flight.
    #[error("Completion for {got} does not match in-flight message {expected:?}")]
    UnexpectedCompletion {
        expected: Option<IsmKey>,
        got: IsmKey,
    },

    /// The site has no queue state.
    #[error("Unknown site: {0}")]
    UnknownSite(SiteId),

    /// A message or control frame could not be encoded.
    #[error("Encoding failed: {0}")]
    Wire(#[from] WireError),
}

/// Result type for sequencer operations.
pub type SequencerResult<T> = Result<T, SequencerError>;
