//! Validation outcomes and failure reporting.
//!
//! Reports are best-effort: a reporter failure is logged and swallowed,
//! never surfaced into the handshake verdict.

use rustls::pki_types::CertificateDer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::DomainPinConfig;
use crate::fingerprint::PinFingerprint;

/// The single outcome of one validation pass.
///
/// When both chain validation and pin matching fail,
/// [`ValidationOutcome::ChainOrHostnameFailure`] is the one reported and
/// raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    /// The chain is trusted and, for pinned hostnames, a pin matched.
    Success,
    /// Hostname verification or chain-of-trust validation failed.
    ChainOrHostnameFailure,
    /// The chain is trusted but no configured pin appears in it.
    PinMismatch,
}

/// Everything a report sink needs to describe one failed validation.
#[derive(Debug)]
pub struct PinFailureReport<'a> {
    /// Hostname the validation was performed for.
    pub hostname: &'a str,
    /// Port of the connection.
    pub port: u16,
    /// Chain exactly as presented by the peer.
    pub served_chain: &'a [CertificateDer<'a>],
    /// Chain as returned by the chain verifier.
    pub validated_chain: &'a [CertificateDer<'a>],
    /// Policy in effect for the hostname.
    pub config: &'a DomainPinConfig,
    /// Why validation failed.
    pub outcome: ValidationOutcome,
}

/// A report sink failure. Never fatal to the handshake.
#[derive(Debug, Error)]
#[error("report delivery failed: {reason}")]
pub struct ReportError {
    /// Sink error message.
    pub reason: String,
}

/// Receives reports of failed pin validations.
pub trait FailureReporter: Send + Sync {
    /// Deliver one failure report.
    fn pin_validation_failed(&self, report: &PinFailureReport<'_>) -> Result<(), ReportError>;
}

/// Reporter that emits a structured warn event per failure.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FailureReporter for TracingReporter {
    fn pin_validation_failed(&self, report: &PinFailureReport<'_>) -> Result<(), ReportError> {
        let configured: Vec<String> = report
            .config
            .pins
            .iter()
            .map(PinFingerprint::to_string)
            .collect();
        let validated: Vec<String> = report
            .validated_chain
            .iter()
            .map(|cert| match PinFingerprint::from_certificate(cert) {
                Ok(fp) => fp.to_string(),
                Err(_) => "<unparseable>".to_string(),
            })
            .collect();
        warn!(
            hostname = report.hostname,
            port = report.port,
            outcome = ?report.outcome,
            enforce = report.config.enforce,
            configured_pins = ?configured,
            chain_fingerprints = ?validated,
            served_len = report.served_chain.len(),
            "pin validation failed"
        );
        Ok(())
    }
}
