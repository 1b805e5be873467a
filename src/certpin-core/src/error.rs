//! Error types for pinning validation.

use std::collections::HashSet;
use std::fmt;

use rustls::pki_types::CertificateDer;
use thiserror::Error;
use x509_parser::prelude::parse_x509_certificate;

use crate::fingerprint::PinFingerprint;

/// Errors that can abort a TLS handshake during pinning validation.
#[derive(Debug, Error)]
pub enum PinningError {
    /// Client certificates are not supported; only server identities are
    /// validated.
    #[error("client certificates not supported")]
    ClientCertUnsupported,

    /// Hostname verification or chain-of-trust validation failed.
    #[error("certificate validation failed for {hostname}")]
    ChainNotTrusted {
        /// Hostname the validation was performed for.
        hostname: String,
    },

    /// Chain and hostname were valid, but no configured pin matched the
    /// validated chain and enforcement is on.
    #[error("pin verification failed for {hostname}\n{details}")]
    PinVerificationFailed {
        /// Hostname the validation was performed for.
        hostname: String,
        /// Configured pins and the observed chain, for post-mortem diagnosis.
        details: PinMismatchDetails,
    },

    /// A certificate could not be parsed as DER-encoded X.509.
    #[error("certificate parse error: {reason}")]
    CertificateParse {
        /// Parser error message.
        reason: String,
    },

    /// A pin string was not a valid SHA-256 fingerprint.
    #[error("invalid pin value: {value}")]
    InvalidPin {
        /// The rejected input.
        value: String,
    },

    /// The shared trust verifier could not be constructed.
    #[error("trust verifier unavailable: {reason}")]
    VerifierUnavailable {
        /// Builder error message.
        reason: String,
    },
}

impl PinningError {
    /// Check if this error is a hostname or chain-of-trust failure.
    ///
    /// These are fatal regardless of the enforcement policy.
    #[must_use]
    pub fn is_chain_failure(&self) -> bool {
        matches!(self, Self::ChainNotTrusted { .. })
    }

    /// Check if this error is a pin mismatch on an otherwise trusted chain.
    #[must_use]
    pub fn is_pin_failure(&self) -> bool {
        matches!(self, Self::PinVerificationFailed { .. })
    }
}

/// Diagnostic payload of a fatal pin mismatch: the configured pin set and
/// the fingerprint plus issuer of every certificate in the validated chain.
#[derive(Debug, Clone)]
pub struct PinMismatchDetails {
    /// Pins configured for the hostname.
    pub configured_pins: Vec<PinFingerprint>,
    /// One entry per certificate in the validated chain.
    pub chain: Vec<ChainCertificateSummary>,
}

/// Fingerprint and issuer identity of one chain certificate.
#[derive(Debug, Clone)]
pub struct ChainCertificateSummary {
    /// Public-key fingerprint, absent if the certificate failed to parse.
    pub fingerprint: Option<PinFingerprint>,
    /// Issuer distinguished name.
    pub issuer: String,
}

impl PinMismatchDetails {
    /// Build the diagnostic payload from the configured pin set and the
    /// validated chain.
    #[must_use]
    pub fn from_parts(pins: &HashSet<PinFingerprint>, chain: &[CertificateDer<'_>]) -> Self {
        let chain = chain
            .iter()
            .map(|cert| {
                let fingerprint = PinFingerprint::from_certificate(cert).ok();
                let issuer = match parse_x509_certificate(cert.as_ref()) {
                    Ok((_, parsed)) => parsed.issuer().to_string(),
                    Err(_) => "<unparseable certificate>".to_string(),
                };
                ChainCertificateSummary { fingerprint, issuer }
            })
            .collect();

        Self {
            configured_pins: pins.iter().copied().collect(),
            chain,
        }
    }
}

impl fmt::Display for PinMismatchDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "  Configured pins:")?;
        for pin in &self.configured_pins {
            write!(f, " {pin}")?;
        }
        write!(f, "\n  Peer certificate chain:")?;
        for entry in &self.chain {
            match &entry.fingerprint {
                Some(fp) => write!(f, "\n    {fp} - {}", entry.issuer)?,
                None => write!(f, "\n    <unparseable> - {}", entry.issuer)?,
            }
        }
        Ok(())
    }
}
