//! # certpin-core
//!
//! Certificate-pinning validation engine for TLS server verification.
//!
//! For a connection to a hostname, the engine decides whether the
//! presented certificate chain is acceptable by combining three
//! independent checks into a single verdict.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    PinningValidator                          │
//! │                                                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐      │
//! │  │ hostname     │  │ ChainVerifier│  │ PinMatcher   │      │
//! │  │ (SAN/CN)     │  │ (webpki)     │  │ (SPKI sha256)│      │
//! │  └──────────────┘  └──────────────┘  └──────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │  ┌──────────────────────────────────────────────────┐      │
//! │  │              FailureReporter                      │      │
//! │  │         (best effort, never fatal)               │      │
//! │  └──────────────────────────────────────────────────┘      │
//! │                           │                                  │
//! │                           ▼                                  │
//! │               allow / abort handshake                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Decision Properties
//!
//! - **Chain dominance**: a hostname or chain-of-trust failure always
//!   outranks a pin mismatch
//! - **Monitor mode**: with `enforce = false` a pin mismatch is reported
//!   but the connection proceeds
//! - **Best-effort reporting**: reporter failures are logged and swallowed
//! - **Structured classification**: native-verifier rejections are
//!   classified by error variant, never by message text

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::pedantic)] // Too strict for production code
#![allow(clippy::doc_markdown)] // Allow product names without backticks
#![allow(clippy::missing_errors_doc)] // Error documentation not required
#![allow(clippy::missing_panics_doc)] // Panic documentation not required
#![allow(clippy::module_name_repetitions)] // Allow Type in module::Type
#![allow(clippy::must_use_candidate)] // Not all functions need must_use

pub mod capability;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod fingerprint;
pub mod hostname;
pub mod report;
pub mod tls;

pub use capability::{CapabilityProbe, PlatformProbe, StaticProbe};
pub use chain::{system_chain_verifier, ChainVerifier, ChainVerifyError, WebPkiChainVerifier};
pub use config::{DomainPinConfig, InMemoryPinSource, PinConfigSource};
pub use engine::PinningValidator;
pub use error::{ChainCertificateSummary, PinMismatchDetails, PinningError};
pub use fingerprint::{any_pin_in_chain, PinFingerprint};
pub use report::{
    FailureReporter, PinFailureReport, ReportError, TracingReporter, ValidationOutcome,
};
pub use tls::PinningServerVerifier;
