//! Ed25519 site credentials.

use crate::ports::outbound::SiteCredentials;
use shared_crypto::{SiteSigningKey, SiteVerifyingKey};
use shared_types::{SitePublicKey, SiteId};
use tracing::trace;

/// Signs with the local site's key and verifies against roster keys.
#[derive(Debug)]
pub struct Ed25519Credentials {
    local_site: SiteId,
    signing_key: SiteSigningKey,
}

impl Ed25519Credentials {
    pub fn new(local_site: SiteId, signing_key: SiteSigningKey) -> Self {
        Self {
            local_site,
            signing_key,
        }
    }

    /// Key to register for the local site in peers' rosters.
    pub fn public_key(&self) -> SitePublicKey {
        *self.signing_key.verifying_key().as_bytes()
    }
}

impl SiteCredentials for Ed25519Credentials {
    fn local_site(&self) -> SiteId {
        self.local_site
    }

    fn sign(&self, body: &[u8]) -> [u8; 64] {
        self.signing_key.sign(body)
    }

    fn verify(&self, public_key: &SitePublicKey, body: &[u8], signature: &[u8; 64]) -> bool {
        let result = SiteVerifyingKey::from_bytes(*public_key)
            .and_then(|key| key.verify(body, signature));
        if let Err(err) = &result {
            trace!("[ism] Signature rejected: {}", err);
        }
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verifies_own_signature() {
        let creds = Ed25519Credentials::new(SiteId(1), SiteSigningKey::from_seed([7; 32]));
        let signature = creds.sign(b"body");
        assert!(creds.verify(&creds.public_key(), b"body", &signature));
        assert!(!creds.verify(&creds.public_key(), b"other", &signature));
    }

    #[test]
    fn test_other_site_key_rejected() {
        let creds = Ed25519Credentials::new(SiteId(1), SiteSigningKey::from_seed([7; 32]));
        let signature = creds.sign(b"body");
        let other = Ed25519Credentials::new(SiteId(2), SiteSigningKey::from_seed([8; 32]));
        assert!(!creds.verify(&other.public_key(), b"body", &signature));
    }
}
