//! Public-key fingerprints and pin matching.
//!
//! A pin is the SHA-256 digest of a certificate's DER-encoded
//! SubjectPublicKeyInfo, so it survives certificate renewal as long as the
//! key pair is kept. Fingerprints compare in constant time and render in
//! the HPKP `sha256/<base64>` form.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rustls::pki_types::CertificateDer;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::warn;
use x509_parser::prelude::parse_x509_certificate;

use crate::error::PinningError;

/// SHA-256 digest of a certificate's SubjectPublicKeyInfo.
#[derive(Clone, Copy)]
pub struct PinFingerprint([u8; 32]);

impl PinFingerprint {
    /// Wrap a raw 32-byte digest.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Compute the fingerprint of a DER-encoded certificate.
    ///
    /// Deterministic: the same certificate always yields the same
    /// fingerprint.
    pub fn from_certificate(cert: &CertificateDer<'_>) -> Result<Self, PinningError> {
        let (_, parsed) =
            parse_x509_certificate(cert.as_ref()).map_err(|e| PinningError::CertificateParse {
                reason: e.to_string(),
            })?;
        let spki = parsed.public_key().raw;
        let digest = Sha256::digest(spki);
        Ok(Self(digest.into()))
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form, without a prefix.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl PartialEq for PinFingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for PinFingerprint {}

// Hashing over the digest bytes is consistent with the constant-time
// equality above, so fingerprints are usable as HashSet members.
impl Hash for PinFingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

impl fmt::Display for PinFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sha256/{}", BASE64.encode(self.0))
    }
}

impl fmt::Debug for PinFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PinFingerprint({self})")
    }
}

impl FromStr for PinFingerprint {
    type Err = PinningError;

    /// Accepts `sha256/<base64>` (HPKP), `sha256:<hex>`, bare 64-char hex,
    /// and bare base64 of 32 bytes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PinningError::InvalidPin {
            value: s.to_string(),
        };

        let decoded: Vec<u8> = if let Some(b64) = s.strip_prefix("sha256/") {
            BASE64.decode(b64).map_err(|_| invalid())?
        } else if let Some(hexed) = s.strip_prefix("sha256:") {
            hex::decode(hexed).map_err(|_| invalid())?
        } else if s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit()) {
            hex::decode(s).map_err(|_| invalid())?
        } else {
            BASE64.decode(s).map_err(|_| invalid())?
        };

        let bytes: [u8; 32] = decoded.try_into().map_err(|_| invalid())?;
        Ok(Self(bytes))
    }
}

impl Serialize for PinFingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PinFingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Scan a certificate chain for the first certificate whose public-key
/// fingerprint is in the pin set.
///
/// Iterates in the given order and short-circuits on the first hit.
/// Certificates that fail to parse cannot match any pin and are skipped;
/// the chain verifier has already accepted the chain at this point.
#[must_use]
pub fn any_pin_in_chain(
    chain: &[CertificateDer<'_>],
    pins: &std::collections::HashSet<PinFingerprint>,
) -> bool {
    for (index, cert) in chain.iter().enumerate() {
        match PinFingerprint::from_certificate(cert) {
            Ok(fingerprint) => {
                if pins.contains(&fingerprint) {
                    return true;
                }
            }
            Err(error) => {
                warn!(index, %error, "skipping unparseable chain certificate in pin scan");
            }
        }
    }
    false
}
