//! Replay selection.
//!
//! A peer asks for one origin's messages above its own watermarks. We answer
//! from whatever we hold for that origin, oldest first, capped per exchange.

use shared_types::{decode_trusted, IsmKey, ReplayRequest, SiteId, Visibility, WireError};

/// An archived message with the fields replay filtering needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchivedIsm {
    pub key: IsmKey,
    pub visibility: Visibility,
    pub destination: Option<SiteId>,
    /// Signed wire bytes, forwarded untouched.
    pub encoded: Vec<u8>,
}

impl ArchivedIsm {
    /// Decodes the routing fields of a stored message.
    pub fn from_encoded(encoded: Vec<u8>) -> Result<Self, WireError> {
        let ism = decode_trusted(&encoded)?;
        Ok(Self {
            key: ism.key(),
            visibility: ism.visibility,
            destination: ism.destination,
            encoded,
        })
    }

    fn matches(&self, request: &ReplayRequest) -> bool {
        if self.key.origin != request.target_origin {
            return false;
        }
        match self.visibility {
            Visibility::Public => self.key.seq_num > request.exclude_public_up_to,
            Visibility::Private => {
                self.destination == Some(request.requesting_site)
                    && self.key.seq_num > request.exclude_private_up_to
            }
        }
    }
}

/// Messages chosen for one replay reply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplaySelection {
    /// Everything that matched, before the cap.
    pub matching: u64,
    /// Signed wire bytes to send, oldest first.
    pub messages: Vec<Vec<u8>>,
}

/// Picks the messages to replay for `request`.
///
/// At most `min(request.max_to_replay, cap)` are returned.
pub fn select_replay(
    mut archive: Vec<ArchivedIsm>,
    request: &ReplayRequest,
    cap: u32,
) -> ReplaySelection {
    archive.retain(|entry| entry.matches(request));
    archive.sort_by_key(|entry| entry.key.seq_num);
    archive.dedup_by_key(|entry| entry.key);

    let limit = request.max_to_replay.min(cap) as usize;
    ReplaySelection {
        matching: archive.len() as u64,
        messages: archive
            .into_iter()
            .take(limit)
            .map(|entry| entry.encoded)
            .collect(),
    }
}
