//! # Signed Wire Envelope
//!
//! Every ISM travels as a [`WireIsm`]: the `bincode` body of the message plus
//! an Ed25519 signature over that body by the origin site.
//!
//! ```text
//! ┌──────────┬──────────────────────────────┬────────────────┐
//! │ version  │ body = bincode(Ism)          │ signature (64) │
//! └──────────┴──────────────────────────────┴────────────────┘
//! ```
//!
//! Decoding is split so the receiver can read the *claimed* origin, look up
//! that site's registered key, and only then verify the signature.

use crate::errors::WireError;
use crate::ism::Ism;
use bincode::Options;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

/// Largest encoded message accepted from the wire.
pub const MAX_WIRE_BYTES: u64 = 16 * 1024 * 1024;

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_WIRE_BYTES)
}

/// Signed envelope as carried in an exchange batch.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireIsm {
    /// Protocol version, checked before the body is decoded.
    pub version: u16,
    /// `bincode` encoding of the [`Ism`].
    pub body: Vec<u8>,
    /// Origin site's signature over `body`.
    #[serde_as(as = "Bytes")]
    pub signature: [u8; 64],
}

impl WireIsm {
    /// Current protocol version.
    pub const CURRENT_VERSION: u16 = 1;
}

/// A decoded message whose signature has not been checked yet.
#[derive(Clone, Debug)]
pub struct UnverifiedIsm {
    /// Decoded message (origin is only *claimed* until verified).
    pub ism: Ism,
    /// Signed bytes.
    pub body: Vec<u8>,
    /// Signature over `body`.
    pub signature: [u8; 64],
}

/// Encodes the body that the origin signs.
pub fn encode_body(ism: &Ism) -> Result<Vec<u8>, WireError> {
    codec()
        .serialize(ism)
        .map_err(|e| WireError::Encode(e.to_string()))
}

/// Assembles a signed envelope from a body and its signature.
pub fn encode_signed(body: Vec<u8>, signature: [u8; 64]) -> Result<Vec<u8>, WireError> {
    let wire = WireIsm {
        version: WireIsm::CURRENT_VERSION,
        body,
        signature,
    };
    codec()
        .serialize(&wire)
        .map_err(|e| WireError::Encode(e.to_string()))
}

/// Decodes an envelope and its body without verifying the signature.
pub fn decode_unverified(bytes: &[u8]) -> Result<UnverifiedIsm, WireError> {
    let wire: WireIsm = codec()
        .deserialize(bytes)
        .map_err(|e| WireError::Malformed(e.to_string()))?;

    if wire.version != WireIsm::CURRENT_VERSION {
        return Err(WireError::UnsupportedVersion {
            received: wire.version,
            supported: WireIsm::CURRENT_VERSION,
        });
    }

    let ism: Ism = codec()
        .deserialize(&wire.body)
        .map_err(|e| WireError::Malformed(e.to_string()))?;

    Ok(UnverifiedIsm {
        ism,
        body: wire.body,
        signature: wire.signature,
    })
}

/// Decodes a persisted message whose signature was already verified on
/// admission.
pub fn decode_trusted(bytes: &[u8]) -> Result<Ism, WireError> {
    decode_unverified(bytes).map(|unverified| unverified.ism)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ism::{Routing, SiteId};

    fn sample() -> Ism {
        Ism::public(SiteId(3), 7, 6, Routing::Repository).with_payload(b"rev-42".to_vec())
    }

    #[test]
    fn test_signed_envelope_preserves_message() {
        let ism = sample();
        let body = encode_body(&ism).unwrap();
        let bytes = encode_signed(body.clone(), [0x5A; 64]).unwrap();

        let decoded = decode_unverified(&bytes).unwrap();
        assert_eq!(decoded.ism, ism);
        assert_eq!(decoded.body, body);
        assert_eq!(decoded.signature, [0x5A; 64]);
    }

    #[test]
    fn test_truncated_bytes_are_malformed() {
        let body = encode_body(&sample()).unwrap();
        let bytes = encode_signed(body, [1; 64]).unwrap();

        let result = decode_unverified(&bytes[..bytes.len() / 2]);
        assert!(matches!(result, Err(WireError::Malformed(_))));
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let wire = WireIsm {
            version: 99,
            body: encode_body(&sample()).unwrap(),
            signature: [0; 64],
        };
        let bytes = codec().serialize(&wire).unwrap();

        let result = decode_unverified(&bytes);
        assert!(matches!(
            result,
            Err(WireError::UnsupportedVersion { received: 99, .. })
        ));
    }

    #[test]
    fn test_garbage_body_is_malformed() {
        let bytes = encode_signed(vec![0xFF, 0xFF, 0xFF], [0; 64]).unwrap();
        assert!(matches!(
            decode_unverified(&bytes),
            Err(WireError::Malformed(_))
        ));
    }
}
