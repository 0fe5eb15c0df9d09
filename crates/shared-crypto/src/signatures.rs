//! # Site Signing Keys (Ed25519)
//!
//! Each site signs the body of every ISM it authors. Receivers verify with
//! the key registered for the claimed origin in their site roster.
//!
//! ## Security Properties
//!
//! - Deterministic signatures (no RNG at signing time)
//! - Strict verification rejects malleable and small-order signatures
//! - Secret seed zeroized on drop

use crate::CryptoError;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use zeroize::Zeroize;

/// A site's registered verifying key (32 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SiteVerifyingKey([u8; 32]);

impl SiteVerifyingKey {
    /// Parses and validates key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Raw key bytes, as stored in the roster.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verifies `signature` over `body`.
    pub fn verify(&self, body: &[u8], signature: &[u8; 64]) -> Result<(), CryptoError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        key.verify_strict(body, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

/// A site's signing key.
pub struct SiteSigningKey {
    signing_key: SigningKey,
}

impl SiteSigningKey {
    /// Generates a fresh random key.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    /// Restores a key from its 32-byte seed.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Parses a 64-character hex seed.
    pub fn from_hex_seed(hex_seed: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_seed.trim())
            .map_err(|e| CryptoError::InvalidInput(format!("seed is not hex: {e}")))?;
        let mut seed: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            CryptoError::InvalidKeyLength {
                expected: 32,
                actual: v.len(),
            }
        })?;
        let key = Self::from_seed(seed);
        seed.zeroize();
        Ok(key)
    }

    /// Verifying key to register in other sites' rosters.
    pub fn verifying_key(&self) -> SiteVerifyingKey {
        SiteVerifyingKey(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs an ISM body.
    pub fn sign(&self, body: &[u8]) -> [u8; 64] {
        self.signing_key.sign(body).to_bytes()
    }
}

impl Drop for SiteSigningKey {
    fn drop(&mut self) {
        let mut bytes = self.signing_key.to_bytes();
        bytes.zeroize();
    }
}

impl std::fmt::Debug for SiteSigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteSigningKey")
            .field("verifying_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}
