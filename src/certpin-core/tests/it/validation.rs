//! End-to-end pinning validation scenarios over generated chains.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, Issuer, KeyPair};
use rustls::client::danger::ServerCertVerifier as _;
use rustls::client::WebPkiServerVerifier;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::RootCertStore;

use certpin_core::{
    any_pin_in_chain, ChainVerifier, ChainVerifyError, DomainPinConfig, FailureReporter,
    InMemoryPinSource, PinFailureReport, PinFingerprint, PinningValidator, ReportError,
    StaticProbe, ValidationOutcome,
};

/// A CA and the certificates it signs.
struct TestCa {
    der: CertificateDer<'static>,
    issuer: Issuer<'static, KeyPair>,
}

impl TestCa {
    fn new(name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::new()).unwrap();
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params
            .distinguished_name
            .push(DnType::CommonName, name.to_string());
        let cert = params.self_signed(&key).unwrap();
        let der = cert.der().clone();
        Self {
            der,
            issuer: Issuer::new(params, key),
        }
    }

    fn issue_leaf(&self, hostname: &str) -> CertificateDer<'static> {
        let key = KeyPair::generate().unwrap();
        let params = CertificateParams::new(vec![hostname.to_string()]).unwrap();
        let cert = params.signed_by(&key, &self.issuer).unwrap();
        cert.der().clone()
    }
}

/// Chain verifier trusting exactly one test root.
struct TestRootVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

impl TestRootVerifier {
    fn trusting(ca: &TestCa) -> Arc<Self> {
        let mut roots = RootCertStore::empty();
        roots.add(ca.der.clone()).unwrap();
        let inner = WebPkiServerVerifier::builder_with_provider(
            Arc::new(roots),
            Arc::new(rustls::crypto::ring::default_provider()),
        )
        .build()
        .unwrap();
        Arc::new(Self { inner })
    }
}

impl ChainVerifier for TestRootVerifier {
    fn verify(
        &self,
        served: &[CertificateDer<'_>],
        hostname: &str,
    ) -> Result<Vec<CertificateDer<'static>>, ChainVerifyError> {
        let (end_entity, intermediates) =
            served
                .split_first()
                .ok_or_else(|| ChainVerifyError::Untrusted {
                    reason: "empty chain".into(),
                })?;
        let name = ServerName::try_from(hostname.to_string()).map_err(|e| {
            ChainVerifyError::Untrusted {
                reason: e.to_string(),
            }
        })?;
        self.inner
            .verify_server_cert(end_entity, intermediates, &name, &[], UnixTime::now())
            .map_err(|e| ChainVerifyError::Untrusted {
                reason: e.to_string(),
            })?;
        Ok(served.iter().map(|c| c.clone().into_owned()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RecordedReport {
    outcome: ValidationOutcome,
    port: u16,
    configured_pins: usize,
    validated_len: usize,
}

#[derive(Default)]
struct RecordingReporter {
    reports: Mutex<Vec<RecordedReport>>,
}

impl FailureReporter for RecordingReporter {
    fn pin_validation_failed(&self, report: &PinFailureReport<'_>) -> Result<(), ReportError> {
        self.reports.lock().unwrap().push(RecordedReport {
            outcome: report.outcome,
            port: report.port,
            configured_pins: report.config.pins.len(),
            validated_len: report.validated_chain.len(),
        });
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn config_for(hostname: &str, pins: Vec<PinFingerprint>, enforce: bool) -> DomainPinConfig {
    DomainPinConfig {
        hostname: hostname.to_string(),
        pins: pins.into_iter().collect(),
        enforce,
    }
}

#[test]
fn pin_on_leaf_allows_signed_chain() {
    init_tracing();
    let ca = TestCa::new("Pin Test Root");
    let leaf = ca.issue_leaf("api.example.com");
    let chain = vec![leaf.clone(), ca.der.clone()];
    let pin = PinFingerprint::from_certificate(&leaf).unwrap();

    let reporter = Arc::new(RecordingReporter::default());
    let validator = PinningValidator::with_collaborators(
        "api.example.com",
        Some(config_for("api.example.com", vec![pin], true)),
        TestRootVerifier::trusting(&ca),
        Arc::new(StaticProbe(false)),
        reporter.clone(),
    );
    assert!(validator.check_server_trusted(&chain).is_ok());
    assert!(reporter.reports.lock().unwrap().is_empty());
}

#[test]
fn pin_anywhere_in_chain_counts() {
    init_tracing();
    // Pinning the CA key instead of the leaf key still matches.
    let ca = TestCa::new("Pin Test Root");
    let leaf = ca.issue_leaf("api.example.com");
    let chain = vec![leaf, ca.der.clone()];
    let ca_pin = PinFingerprint::from_certificate(&ca.der).unwrap();

    let reporter = Arc::new(RecordingReporter::default());
    let validator = PinningValidator::with_collaborators(
        "api.example.com",
        Some(config_for("api.example.com", vec![ca_pin], true)),
        TestRootVerifier::trusting(&ca),
        Arc::new(StaticProbe(false)),
        reporter.clone(),
    );
    assert!(validator.check_server_trusted(&chain).is_ok());
}

#[test]
fn untrusted_ca_rejected_despite_matching_pin() {
    init_tracing();
    let trusted = TestCa::new("Trusted Root");
    let rogue = TestCa::new("Rogue Root");
    let leaf = rogue.issue_leaf("api.example.com");
    let chain = vec![leaf.clone(), rogue.der.clone()];
    let pin = PinFingerprint::from_certificate(&leaf).unwrap();

    let reporter = Arc::new(RecordingReporter::default());
    let validator = PinningValidator::with_collaborators(
        "api.example.com",
        Some(config_for("api.example.com", vec![pin], true)),
        TestRootVerifier::trusting(&trusted),
        Arc::new(StaticProbe(false)),
        reporter.clone(),
    );
    let err = validator.check_server_trusted(&chain).unwrap_err();
    assert!(err.is_chain_failure());

    let reports = reporter.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, ValidationOutcome::ChainOrHostnameFailure);
}

#[test]
fn monitor_mode_reports_mismatch_and_allows() {
    init_tracing();
    let ca = TestCa::new("Pin Test Root");
    let leaf = ca.issue_leaf("api.example.com");
    let chain = vec![leaf, ca.der.clone()];
    let unrelated_pin = PinFingerprint::from_bytes([0x55; 32]);

    let reporter = Arc::new(RecordingReporter::default());
    let validator = PinningValidator::with_collaborators(
        "api.example.com",
        Some(config_for("api.example.com", vec![unrelated_pin], false)),
        TestRootVerifier::trusting(&ca),
        Arc::new(StaticProbe(false)),
        reporter.clone(),
    );
    assert!(validator.check_server_trusted(&chain).is_ok());

    let reports = reporter.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, ValidationOutcome::PinMismatch);
    assert_eq!(reports[0].validated_len, 2);
}

#[test]
fn wrong_hostname_dominates_matching_pin() {
    init_tracing();
    let ca = TestCa::new("Pin Test Root");
    let leaf = ca.issue_leaf("other.example.com");
    let chain = vec![leaf.clone(), ca.der.clone()];
    let pin = PinFingerprint::from_certificate(&leaf).unwrap();

    let reporter = Arc::new(RecordingReporter::default());
    let validator = PinningValidator::with_collaborators(
        "api.example.com",
        Some(config_for("api.example.com", vec![pin], true)),
        TestRootVerifier::trusting(&ca),
        Arc::new(StaticProbe(false)),
        reporter.clone(),
    );
    let err = validator.check_server_trusted(&chain).unwrap_err();
    assert!(err.is_chain_failure());
    assert_eq!(
        reporter.reports.lock().unwrap()[0].outcome,
        ValidationOutcome::ChainOrHostnameFailure
    );
}

#[test]
fn report_carries_port_and_policy() {
    init_tracing();
    let ca = TestCa::new("Pin Test Root");
    let leaf = ca.issue_leaf("api.example.com");
    let chain = vec![leaf, ca.der.clone()];
    let pins = vec![
        PinFingerprint::from_bytes([0x01; 32]),
        PinFingerprint::from_bytes([0x02; 32]),
    ];

    let reporter = Arc::new(RecordingReporter::default());
    let validator = PinningValidator::with_collaborators(
        "api.example.com",
        Some(config_for("api.example.com", pins, true)),
        TestRootVerifier::trusting(&ca),
        Arc::new(StaticProbe(false)),
        reporter.clone(),
    )
    .with_port(8443);
    assert!(validator.check_server_trusted(&chain).is_err());

    let reports = reporter.reports.lock().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].port, 8443);
    assert_eq!(reports[0].configured_pins, 2);
}

#[test]
fn fatal_mismatch_error_lists_chain_details() {
    init_tracing();
    let ca = TestCa::new("Diagnostic Root");
    let leaf = ca.issue_leaf("api.example.com");
    let chain = vec![leaf.clone(), ca.der.clone()];
    let configured = PinFingerprint::from_bytes([0x09; 32]);

    let validator = PinningValidator::with_collaborators(
        "api.example.com",
        Some(config_for("api.example.com", vec![configured], true)),
        TestRootVerifier::trusting(&ca),
        Arc::new(StaticProbe(false)),
        Arc::new(RecordingReporter::default()),
    );
    let err = validator.check_server_trusted(&chain).unwrap_err();
    let message = err.to_string();
    assert!(message.contains(&configured.to_string()));
    let leaf_fp = PinFingerprint::from_certificate(&leaf).unwrap();
    assert!(message.contains(&leaf_fp.to_string()));
    assert!(message.contains("Diagnostic Root"));
}

#[test]
fn matcher_result_is_order_independent() {
    init_tracing();
    let ca = TestCa::new("Order Root");
    let a = ca.issue_leaf("a.example.com");
    let b = ca.issue_leaf("b.example.com");
    let pin = PinFingerprint::from_certificate(&b).unwrap();
    let pins: HashSet<PinFingerprint> = [pin].into_iter().collect();

    let forward = vec![a.clone(), b.clone(), ca.der.clone()];
    let reverse = vec![ca.der.clone(), b, a];
    assert_eq!(
        any_pin_in_chain(&forward, &pins),
        any_pin_in_chain(&reverse, &pins)
    );
}

#[test]
fn system_verifier_rejects_locally_issued_chain() {
    init_tracing();
    // The default validator path with a fresh source: unpinned hostname,
    // real web trust anchors, a chain they cannot possibly validate.
    let ca = TestCa::new("Local Root");
    let leaf = ca.issue_leaf("example.com");
    let source = InMemoryPinSource::new();
    let validator = PinningValidator::new("example.com", &source).unwrap();
    let err = validator
        .check_server_trusted(&[leaf, ca.der.clone()])
        .unwrap_err();
    assert!(err.is_chain_failure());
}
