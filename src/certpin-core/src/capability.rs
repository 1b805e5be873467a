//! Platform capability probing.
//!
//! On some platforms the trust stack enforces declaratively configured pins
//! during path validation itself; there the engine must not re-run the pin
//! scan, only classify the stack's rejection. Everywhere else the engine
//! performs the pin scan manually.

/// Answers whether the ambient trust stack enforces pins natively.
pub trait CapabilityProbe: Send + Sync {
    /// True when path validation already enforces configured pins.
    fn has_native_pin_enforcement(&self) -> bool;
}

/// Probe resolved from the compilation target.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformProbe;

impl CapabilityProbe for PlatformProbe {
    #[cfg(target_os = "android")]
    fn has_native_pin_enforcement(&self) -> bool {
        // The platform verifier applies network security config pins
        // during path validation.
        true
    }

    #[cfg(not(target_os = "android"))]
    fn has_native_pin_enforcement(&self) -> bool {
        false
    }
}

/// Fixed-answer probe for hosts that inject their own natively-enforcing
/// verifier, and for tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(
    /// The fixed answer.
    pub bool,
);

impl CapabilityProbe for StaticProbe {
    fn has_native_pin_enforcement(&self) -> bool {
        self.0
    }
}
