//! # Inter-Site Message (ISM)
//!
//! The immutable value describing one causally-ordered update authored by a
//! site. Every other site must apply an origin's messages exactly once and in
//! the order the origin produced them.
//!
//! ## Causal Link
//!
//! ```text
//! origin A:  [seq 1, prev 0] ──→ [seq 2, prev 1] ──→ [seq 5, prev 2]
//!                                                          │
//!            eligible only once watermark(A, visibility) == 2
//! ```
//!
//! `prev_seq_num` names the message immediately preceding this one in the
//! origin's own emission order. The first message an origin ever emits uses
//! [`INVALID_SEQ_NUM`], which coincides with the empty watermark.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Timestamp in milliseconds since UNIX epoch.
pub type Timestamp = u64;

/// Per-origin sequence number.
pub type SeqNum = u64;

/// `prev_seq_num` of an origin's first-ever message; also the empty watermark.
pub const INVALID_SEQ_NUM: SeqNum = 0;

/// Modulus used for round-robin ranking. Exceeds every possible [`SiteId`].
pub const SITE_ID_MODULUS: u32 = 1 << 16;

/// Identifier of a site in the mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SiteId(pub u16);

impl SiteId {
    /// Raw numeric id.
    pub fn get(self) -> u16 {
        self.0
    }

    /// Rank of this site relative to the last served origin.
    ///
    /// The site immediately after `last` ranks 0; `last` itself ranks last.
    pub fn round_robin_rank(self, last: SiteId) -> u32 {
        (u32::from(self.0) + SITE_ID_MODULUS - u32::from(last.0) - 1) % SITE_ID_MODULUS
    }
}

impl From<u16> for SiteId {
    fn from(id: u16) -> Self {
        Self(id)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "site-{}", self.0)
    }
}

/// Visibility class. Watermarks are tracked separately per class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// Broadcast to every site.
    Public,
    /// Addressed to exactly one destination site.
    Private,
}

/// Which downstream consumer interprets the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Routing {
    /// Site-membership logic.
    Membership,
    /// Sample-identifier allocation.
    Identifiers,
    /// Repository file versioning.
    Repository,
    /// Stored only; no semantic processing required.
    FileOnly,
}

/// Dependency of a message on another origin's progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CausalDependency {
    /// Origin whose progress is awaited.
    pub site: SiteId,
    /// Sequence number from `site` that must have been applied.
    pub seq_num: SeqNum,
}

impl CausalDependency {
    /// True when applying `foreign` satisfies this dependency.
    pub fn is_satisfied_by(&self, foreign: &Ism) -> bool {
        foreign.origin == self.site && foreign.seq_num >= self.seq_num
    }
}

/// Type tag of a message.
///
/// The tag is the only part of the payload the sequencer looks at: it decides
/// whether the message waits on another origin.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    /// Ordinary update with no cross-origin wait.
    Update,
    /// A site asking to join, sponsored by another site whose approval
    /// message must be applied first.
    JoinRequest {
        /// Sponsoring site.
        sponsor: SiteId,
        /// Sponsor's approval message.
        sponsor_seq_num: SeqNum,
    },
    /// Generic wait on another origin.
    AwaitSite(CausalDependency),
}

impl MessageKind {
    /// Cross-origin dependency carried by this tag, if any.
    pub fn awaits(&self) -> Option<CausalDependency> {
        match self {
            Self::Update => None,
            Self::JoinRequest {
                sponsor,
                sponsor_seq_num,
            } => Some(CausalDependency {
                site: *sponsor,
                seq_num: *sponsor_seq_num,
            }),
            Self::AwaitSite(dep) => Some(*dep),
        }
    }
}

/// An inter-site message.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ism {
    /// Authoring site.
    pub origin: SiteId,
    /// Strictly increasing per-origin sequence number.
    pub seq_num: SeqNum,
    /// Causal link to the previous message of the same origin.
    pub prev_seq_num: SeqNum,
    /// Public or private.
    pub visibility: Visibility,
    /// Destination of a private message.
    pub destination: Option<SiteId>,
    /// Control message scoped to a single exchange.
    pub link_local: bool,
    /// Consumer routing.
    pub routing: Routing,
    /// Deadline for reactive behaviour (auto-approval and the like).
    pub expiry: Option<Timestamp>,
    /// Type tag.
    pub kind: MessageKind,
    /// The message must be archived after processing.
    pub archive: bool,
    /// Opaque payload.
    pub payload: Vec<u8>,
}

impl Ism {
    /// Creates a public update with routing `routing`.
    pub fn public(origin: SiteId, seq_num: SeqNum, prev_seq_num: SeqNum, routing: Routing) -> Self {
        Self {
            origin,
            seq_num,
            prev_seq_num,
            visibility: Visibility::Public,
            destination: None,
            link_local: false,
            routing,
            expiry: None,
            kind: MessageKind::Update,
            archive: false,
            payload: Vec::new(),
        }
    }

    /// Creates a private update addressed to `destination`.
    pub fn private(
        origin: SiteId,
        destination: SiteId,
        seq_num: SeqNum,
        prev_seq_num: SeqNum,
        routing: Routing,
    ) -> Self {
        Self {
            visibility: Visibility::Private,
            destination: Some(destination),
            ..Self::public(origin, seq_num, prev_seq_num, routing)
        }
    }

    /// Creates a link-local control message carrying `payload`.
    pub fn link_local(origin: SiteId, destination: SiteId, payload: Vec<u8>) -> Self {
        Self {
            visibility: Visibility::Private,
            destination: Some(destination),
            link_local: true,
            routing: Routing::FileOnly,
            payload,
            ..Self::public(origin, INVALID_SEQ_NUM, INVALID_SEQ_NUM, Routing::FileOnly)
        }
    }

    /// Sets the type tag.
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Sets the payload.
    pub fn with_payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    /// Sets the expiry deadline.
    pub fn with_expiry(mut self, expiry: Timestamp) -> Self {
        self.expiry = Some(expiry);
        self
    }

    /// Requests archival after processing.
    pub fn with_archive(mut self) -> Self {
        self.archive = true;
        self
    }

    /// Key under which the message is persisted.
    pub fn key(&self) -> IsmKey {
        IsmKey {
            origin: self.origin,
            seq_num: self.seq_num,
        }
    }

    /// True once the expiry deadline has passed.
    ///
    /// Expired messages are still valid for ordering purposes.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiry.map(|deadline| now > deadline).unwrap_or(false)
    }

    /// True when a private message is addressed to `site`. Public messages
    /// are addressed to everyone.
    pub fn is_addressed_to(&self, site: SiteId) -> bool {
        match self.visibility {
            Visibility::Public => true,
            Visibility::Private => self.destination == Some(site),
        }
    }
}

impl PartialOrd for Ism {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ism {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seq_num
            .cmp(&other.seq_num)
            .then_with(|| self.origin.cmp(&other.origin))
            .then_with(|| self.prev_seq_num.cmp(&other.prev_seq_num))
            .then_with(|| self.visibility.cmp(&other.visibility))
            .then_with(|| self.destination.cmp(&other.destination))
            .then_with(|| self.link_local.cmp(&other.link_local))
            .then_with(|| self.routing.cmp(&other.routing))
            .then_with(|| self.expiry.cmp(&other.expiry))
            .then_with(|| self.kind.cmp(&other.kind))
            .then_with(|| self.archive.cmp(&other.archive))
            .then_with(|| self.payload.cmp(&other.payload))
    }
}

/// Storage key of a persisted message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IsmKey {
    /// Authoring site.
    pub origin: SiteId,
    /// Sequence number.
    pub seq_num: SeqNum,
}

impl fmt::Display for IsmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.origin, self.seq_num)
    }
}
