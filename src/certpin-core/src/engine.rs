//! The pinning decision engine.
//!
//! One [`PinningValidator`] is built per validation subject (hostname plus
//! resolved policy) and combines three independent checks into a single
//! verdict:
//!
//! ```text
//!   served chain
//!        |
//!        v
//!   hostname check ----> chain-of-trust check ----> pin membership
//!        |                      |                        |
//!        +----------------------+------------------------+
//!                               |
//!                     report (best effort)
//!                               |
//!                       allow / abort
//! ```
//!
//! A hostname or chain failure always dominates a pin mismatch, and a pin
//! mismatch only aborts the handshake when the policy enforces.

use std::sync::Arc;

use rustls::pki_types::CertificateDer;
use tracing::{debug, instrument, warn};

use crate::capability::{CapabilityProbe, PlatformProbe};
use crate::chain::{system_chain_verifier, ChainVerifier, ChainVerifyError};
use crate::config::{DomainPinConfig, PinConfigSource};
use crate::error::{PinMismatchDetails, PinningError};
use crate::fingerprint::any_pin_in_chain;
use crate::hostname::verify_hostname;
use crate::report::{FailureReporter, PinFailureReport, TracingReporter, ValidationOutcome};

/// Decides whether a served certificate chain is acceptable for one
/// hostname.
///
/// Stateless after construction; safe to use from multiple threads,
/// though one instance per handshake is the intended shape.
pub struct PinningValidator {
    hostname: String,
    port: u16,
    config: Option<DomainPinConfig>,
    chain_verifier: Arc<dyn ChainVerifier>,
    capabilities: Arc<dyn CapabilityProbe>,
    reporter: Arc<dyn FailureReporter>,
}

impl PinningValidator {
    /// Build a validator for `hostname` with the default collaborators:
    /// the shared webpki chain verifier, the compile-time platform probe,
    /// and the tracing reporter. The policy is resolved from `source` now;
    /// later source updates do not affect this instance.
    pub fn new(hostname: &str, source: &dyn PinConfigSource) -> Result<Self, PinningError> {
        Ok(Self {
            hostname: hostname.to_string(),
            port: 443,
            config: source.config_for(hostname),
            chain_verifier: system_chain_verifier()?,
            capabilities: Arc::new(PlatformProbe),
            reporter: Arc::new(TracingReporter),
        })
    }

    /// Build a validator with explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        hostname: &str,
        config: Option<DomainPinConfig>,
        chain_verifier: Arc<dyn ChainVerifier>,
        capabilities: Arc<dyn CapabilityProbe>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            hostname: hostname.to_string(),
            port: 443,
            config,
            chain_verifier,
            capabilities,
            reporter,
        }
    }

    /// Set the connection port carried in failure reports. Defaults to 443.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Validate a server certificate chain.
    ///
    /// For unpinned hostnames this delegates to the chain verifier and
    /// nothing else. For pinned hostnames it runs the hostname check, the
    /// chain-of-trust check, and (absent native enforcement) the pin scan,
    /// reports any failure, and raises the dominant one.
    #[instrument(skip(self, served), fields(hostname = %self.hostname))]
    pub fn check_server_trusted(
        &self,
        served: &[CertificateDer<'_>],
    ) -> Result<(), PinningError> {
        let Some(config) = &self.config else {
            debug!("hostname not pinned, delegating to chain verifier");
            return match self.chain_verifier.verify(served, &self.hostname) {
                Ok(_) => Ok(()),
                Err(error) => {
                    debug!(%error, "chain validation failed for unpinned hostname");
                    Err(PinningError::ChainNotTrusted {
                        hostname: self.hostname.clone(),
                    })
                }
            };
        };

        let mut chain_failed = false;
        let mut pin_failed = false;
        let mut validated_chain: Vec<CertificateDer<'static>> =
            served.iter().map(|c| c.clone().into_owned()).collect();

        // Hostname check on the leaf, independent of path validation.
        match served.first() {
            Some(leaf) => {
                if !verify_hostname(leaf, &self.hostname) {
                    debug!("leaf certificate does not match hostname");
                    chain_failed = true;
                }
            }
            None => {
                debug!("empty served chain");
                chain_failed = true;
            }
        }

        match self.chain_verifier.verify(served, &self.hostname) {
            Ok(chain) => validated_chain = chain,
            Err(ChainVerifyError::PinRejection)
                if self.capabilities.has_native_pin_enforcement() =>
            {
                debug!("native verifier rejected the chain on pins");
                pin_failed = true;
            }
            Err(error) => {
                debug!(%error, "chain validation failed");
                chain_failed = true;
            }
        }

        if !self.capabilities.has_native_pin_enforcement() && !chain_failed {
            pin_failed = !any_pin_in_chain(&validated_chain, &config.pins);
        }

        if chain_failed || pin_failed {
            let outcome = if chain_failed {
                ValidationOutcome::ChainOrHostnameFailure
            } else {
                ValidationOutcome::PinMismatch
            };
            self.dispatch_report(served, &validated_chain, config, outcome);
        }

        if chain_failed {
            return Err(PinningError::ChainNotTrusted {
                hostname: self.hostname.clone(),
            });
        }
        if pin_failed && config.enforce {
            return Err(PinningError::PinVerificationFailed {
                hostname: self.hostname.clone(),
                details: PinMismatchDetails::from_parts(&config.pins, &validated_chain),
            });
        }
        if pin_failed {
            debug!("pin mismatch in monitor mode, allowing connection");
        }
        Ok(())
    }

    /// Client certificates are never accepted.
    pub fn check_client_trusted(
        &self,
        _chain: &[CertificateDer<'_>],
    ) -> Result<(), PinningError> {
        Err(PinningError::ClientCertUnsupported)
    }

    /// Issuers accepted for client certificates: none.
    #[must_use]
    pub fn accepted_issuers(&self) -> Vec<CertificateDer<'static>> {
        Vec::new()
    }

    fn dispatch_report(
        &self,
        served: &[CertificateDer<'_>],
        validated: &[CertificateDer<'static>],
        config: &DomainPinConfig,
        outcome: ValidationOutcome,
    ) {
        let report = PinFailureReport {
            hostname: &self.hostname,
            port: self.port,
            served_chain: served,
            validated_chain: validated,
            config,
            outcome,
        };
        if let Err(error) = self.reporter.pin_validation_failed(&report) {
            warn!(%error, "failure report could not be delivered");
        }
    }
}
