//! Site roster entities.

use crate::ism::{SeqNum, SiteId, Visibility, INVALID_SEQ_NUM};
use serde::{Deserialize, Serialize};

/// Ed25519 verifying key bytes registered for a site.
pub type SitePublicKey = [u8; 32];

/// Participation status of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiteStatus {
    /// Participating normally.
    Active,
    /// Leaving the mesh; messages past `final_seq_num` are refused.
    Deactivating { final_seq_num: SeqNum },
    /// No longer participating.
    Inactive,
}

/// One entry of the durable site roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Site identifier.
    pub site_id: SiteId,
    /// Registered signing key.
    pub public_key: SitePublicKey,
    /// Participation status.
    pub status: SiteStatus,
    /// Highest public seq applied locally.
    pub applied_public: SeqNum,
    /// Highest private seq applied locally.
    pub applied_private: SeqNum,
}

impl SiteRecord {
    /// Creates an active site with empty watermarks.
    pub fn active(site_id: SiteId, public_key: SitePublicKey) -> Self {
        Self {
            site_id,
            public_key,
            status: SiteStatus::Active,
            applied_public: INVALID_SEQ_NUM,
            applied_private: INVALID_SEQ_NUM,
        }
    }

    /// Sets both watermarks.
    pub fn with_watermarks(mut self, public: SeqNum, private: SeqNum) -> Self {
        self.applied_public = public;
        self.applied_private = private;
        self
    }

    /// Watermark for `visibility`.
    pub fn watermark(&self, visibility: Visibility) -> SeqNum {
        match visibility {
            Visibility::Public => self.applied_public,
            Visibility::Private => self.applied_private,
        }
    }

    /// Announced final sequence number, if the site is leaving.
    pub fn final_seq_num(&self) -> Option<SeqNum> {
        match self.status {
            SiteStatus::Deactivating { final_seq_num } => Some(final_seq_num),
            _ => None,
        }
    }

    /// True unless the site is fully inactive.
    pub fn is_participating(&self) -> bool {
        !matches!(self.status, SiteStatus::Inactive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_seq_only_while_deactivating() {
        let mut record = SiteRecord::active(SiteId(1), [0; 32]);
        assert_eq!(record.final_seq_num(), None);

        record.status = SiteStatus::Deactivating { final_seq_num: 12 };
        assert_eq!(record.final_seq_num(), Some(12));
        assert!(record.is_participating());

        record.status = SiteStatus::Inactive;
        assert!(!record.is_participating());
    }

    #[test]
    fn test_watermark_per_visibility() {
        let record = SiteRecord::active(SiteId(1), [0; 32]).with_watermarks(8, 3);
        assert_eq!(record.watermark(Visibility::Public), 8);
        assert_eq!(record.watermark(Visibility::Private), 3);
    }
}
