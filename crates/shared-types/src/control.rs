//! # Link-Local Control Frames
//!
//! Payloads of link-local ISMs. They drive the pull-based replay (gossip)
//! sub-protocol and are scoped to the exchange that carries them.
//!
//! | Kind | Frame | Direction |
//! |------|-------|-----------|
//! | 1 | [`ReplayRequest`] | puller → holder |
//! | 2 | [`ReplayResponse`] | holder → puller, after the replayed messages |

use crate::errors::WireError;
use crate::ism::{SeqNum, SiteId};
use serde::{Deserialize, Serialize};

/// Frame kind codes.
pub mod kinds {
    /// [`super::ReplayRequest`].
    pub const REPLAY_REQUEST: u16 = 1;
    /// [`super::ReplayResponse`].
    pub const REPLAY_RESPONSE: u16 = 2;
}

/// Tagged control payload. Unknown kinds decode fine and are counted by the
/// receiver rather than rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFrame {
    /// Frame kind code.
    pub kind: u16,
    /// Kind-specific body.
    pub body: Vec<u8>,
}

/// Ask a peer for messages it holds from `target_origin`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayRequest {
    /// Site asking for the replay. Must match the authenticated sender.
    pub requesting_site: SiteId,
    /// Origin whose messages are wanted.
    pub target_origin: SiteId,
    /// Public messages up to and including this seq are already applied.
    pub exclude_public_up_to: SeqNum,
    /// Private messages up to and including this seq are already applied.
    pub exclude_private_up_to: SeqNum,
    /// Upper bound on messages to send back.
    pub max_to_replay: u32,
}

/// Summary of a replay, sent after the replayed messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayResponse {
    /// Origin the replay was for.
    pub target_origin: SiteId,
    /// Messages matching the request criteria.
    pub matching: u64,
    /// Messages actually included in the reply batch.
    pub replayed: u64,
}

impl ReplayResponse {
    /// Approximate backlog still available from the replying site.
    pub fn remaining(&self) -> u64 {
        self.matching.saturating_sub(self.replayed)
    }
}

/// A decoded control frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControlMessage {
    /// Replay request.
    ReplayRequest(ReplayRequest),
    /// Replay response.
    ReplayResponse(ReplayResponse),
    /// Frame kind this build does not understand.
    Unrecognized(u16),
}

impl ControlMessage {
    /// Encodes the frame as an ISM payload.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        let frame = match self {
            Self::ReplayRequest(req) => ControlFrame {
                kind: kinds::REPLAY_REQUEST,
                body: bincode::serialize(req).map_err(|e| WireError::Encode(e.to_string()))?,
            },
            Self::ReplayResponse(resp) => ControlFrame {
                kind: kinds::REPLAY_RESPONSE,
                body: bincode::serialize(resp).map_err(|e| WireError::Encode(e.to_string()))?,
            },
            Self::Unrecognized(kind) => ControlFrame {
                kind: *kind,
                body: Vec::new(),
            },
        };
        bincode::serialize(&frame).map_err(|e| WireError::Encode(e.to_string()))
    }

    /// Decodes an ISM payload into a control frame.
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let frame: ControlFrame =
            bincode::deserialize(payload).map_err(|e| WireError::Malformed(e.to_string()))?;
        match frame.kind {
            kinds::REPLAY_REQUEST => bincode::deserialize(&frame.body)
                .map(Self::ReplayRequest)
                .map_err(|e| WireError::Malformed(e.to_string())),
            kinds::REPLAY_RESPONSE => bincode::deserialize(&frame.body)
                .map(Self::ReplayResponse)
                .map_err(|e| WireError::Malformed(e.to_string())),
            other => Ok(Self::Unrecognized(other)),
        }
    }
}
