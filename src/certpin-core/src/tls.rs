//! rustls integration.
//!
//! [`PinningServerVerifier`] plugs the decision engine into a rustls client
//! config as the dangerous server-certificate verifier.

use std::fmt;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{verify_tls12_signature, verify_tls13_signature, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, Error as TlsError, SignatureScheme};
use tracing::debug;

use crate::capability::CapabilityProbe;
use crate::chain::ChainVerifier;
use crate::config::PinConfigSource;
use crate::engine::PinningValidator;
use crate::report::FailureReporter;

/// rustls server-certificate verifier that runs pin validation.
///
/// Each handshake resolves the pin policy for its DNS server name and runs
/// a fresh [`PinningValidator`]. IP-literal server names have no pin-config
/// hostname and receive plain chain validation.
pub struct PinningServerVerifier {
    source: Arc<dyn PinConfigSource>,
    chain_verifier: Arc<dyn ChainVerifier>,
    capabilities: Arc<dyn CapabilityProbe>,
    reporter: Arc<dyn FailureReporter>,
    crypto_provider: Arc<CryptoProvider>,
}

impl PinningServerVerifier {
    /// Build a verifier from the given collaborators and the ring crypto
    /// provider for signature verification.
    #[must_use]
    pub fn new(
        source: Arc<dyn PinConfigSource>,
        chain_verifier: Arc<dyn ChainVerifier>,
        capabilities: Arc<dyn CapabilityProbe>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            source,
            chain_verifier,
            capabilities,
            reporter,
            crypto_provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    fn hostname_of(server_name: &ServerName<'_>) -> String {
        match server_name {
            ServerName::DnsName(dns) => dns.as_ref().to_string(),
            ServerName::IpAddress(ip) => std::net::IpAddr::from(*ip).to_string(),
            other => format!("{other:?}"),
        }
    }
}

impl fmt::Debug for PinningServerVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinningServerVerifier").finish_non_exhaustive()
    }
}

impl ServerCertVerifier for PinningServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, TlsError> {
        let hostname = Self::hostname_of(server_name);

        // Pin configs are keyed by DNS name; IP literals are unpinned.
        let config = match server_name {
            ServerName::DnsName(_) => self.source.config_for(&hostname),
            _ => None,
        };
        debug!(hostname, pinned = config.is_some(), "verifying server certificate");

        let mut served: Vec<CertificateDer<'static>> =
            Vec::with_capacity(1 + intermediates.len());
        served.push(end_entity.clone().into_owned());
        served.extend(intermediates.iter().map(|c| c.clone().into_owned()));

        let validator = PinningValidator::with_collaborators(
            &hostname,
            config,
            Arc::clone(&self.chain_verifier),
            Arc::clone(&self.capabilities),
            Arc::clone(&self.reporter),
        );

        validator
            .check_server_trusted(&served)
            .map(|()| ServerCertVerified::assertion())
            .map_err(|error| TlsError::General(error.to_string()))
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.crypto_provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, TlsError> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.crypto_provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.crypto_provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
