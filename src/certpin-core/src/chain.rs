//! Chain-of-trust validation.
//!
//! The engine consumes chain validation through the [`ChainVerifier`] trait
//! so platform trust stores can be plugged in. The default implementation
//! validates against the Mozilla root program via webpki.

use std::sync::{Arc, OnceLock};

use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::RootCertStore;
use thiserror::Error;
use tracing::debug;

use crate::error::PinningError;

/// Why chain validation rejected a certificate chain.
///
/// The engine classifies failures by variant, never by message text. A
/// verifier that itself enforces pins reports [`ChainVerifyError::PinRejection`]
/// so the engine can attribute the failure to pinning rather than trust.
#[derive(Debug, Error)]
pub enum ChainVerifyError {
    /// The verifier enforces pins natively and rejected the chain because
    /// no pin matched, not because the chain is untrusted.
    #[error("pin rejected by native verifier")]
    PinRejection,

    /// The chain does not lead to a trusted anchor, is expired, malformed,
    /// or otherwise fails path validation.
    #[error("untrusted chain: {reason}")]
    Untrusted {
        /// Underlying verifier message.
        reason: String,
    },
}

/// Validates a served certificate chain up to a trust anchor.
pub trait ChainVerifier: Send + Sync {
    /// Validate `served` for a connection to `hostname`.
    ///
    /// On success, returns the validated chain. Implementations that build
    /// a cleaned path (dropping extraneous certificates, appending the
    /// anchor) return that path; others return the served chain unchanged.
    fn verify(
        &self,
        served: &[CertificateDer<'_>],
        hostname: &str,
    ) -> Result<Vec<CertificateDer<'static>>, ChainVerifyError>;
}

/// Default verifier backed by rustls webpki over the Mozilla roots.
///
/// webpki does not expose the built path, so the validated chain it returns
/// equals the served chain. It never enforces pins, so it never reports
/// [`ChainVerifyError::PinRejection`].
pub struct WebPkiChainVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl WebPkiChainVerifier {
    /// Build a verifier over the bundled Mozilla trust anchors with the
    /// ring crypto provider.
    pub fn new() -> Result<Self, PinningError> {
        let roots = RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        let inner = WebPkiServerVerifier::builder_with_provider(
            Arc::new(roots),
            Arc::new(rustls::crypto::ring::default_provider()),
        )
        .build()
        .map_err(|e| PinningError::VerifierUnavailable {
            reason: e.to_string(),
        })?;
        Ok(Self { inner })
    }
}

impl ChainVerifier for WebPkiChainVerifier {
    fn verify(
        &self,
        served: &[CertificateDer<'_>],
        hostname: &str,
    ) -> Result<Vec<CertificateDer<'static>>, ChainVerifyError> {
        let (end_entity, intermediates) =
            served
                .split_first()
                .ok_or_else(|| ChainVerifyError::Untrusted {
                    reason: "empty certificate chain".to_string(),
                })?;

        let server_name = ServerName::try_from(hostname.to_string()).map_err(|e| {
            ChainVerifyError::Untrusted {
                reason: format!("invalid server name: {e}"),
            }
        })?;

        use rustls::client::danger::ServerCertVerifier as _;
        self.inner
            .verify_server_cert(
                end_entity,
                intermediates,
                &server_name,
                &[],
                UnixTime::now(),
            )
            .map_err(|e| ChainVerifyError::Untrusted {
                reason: e.to_string(),
            })?;

        debug!(hostname, chain_len = served.len(), "chain validated");
        Ok(served.iter().map(|c| c.clone().into_owned()).collect())
    }
}

static SYSTEM_VERIFIER: OnceLock<Arc<WebPkiChainVerifier>> = OnceLock::new();

/// Process-wide shared default chain verifier.
///
/// Built on first use; concurrent first calls may each build an instance
/// but exactly one is retained and all callers observe the same one.
pub fn system_chain_verifier() -> Result<Arc<WebPkiChainVerifier>, PinningError> {
    if let Some(verifier) = SYSTEM_VERIFIER.get() {
        return Ok(Arc::clone(verifier));
    }
    let built = Arc::new(WebPkiChainVerifier::new()?);
    Ok(Arc::clone(SYSTEM_VERIFIER.get_or_init(|| built)))
}
