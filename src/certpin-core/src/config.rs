//! Per-hostname pin configuration.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::fingerprint::PinFingerprint;

/// Pinning policy for one hostname.
///
/// Immutable once resolved. The engine fetches a fresh config per
/// validation and never caches it, so policy updates take effect on the
/// next connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainPinConfig {
    /// Hostname this policy applies to.
    pub hostname: String,
    /// Accepted public-key fingerprints, anywhere in the validated chain.
    pub pins: HashSet<PinFingerprint>,
    /// Whether a pin mismatch aborts the connection. When false,
    /// mismatches are reported but the connection proceeds.
    pub enforce: bool,
}

/// Resolves the pin configuration applying to a hostname.
pub trait PinConfigSource: Send + Sync {
    /// The config for `hostname`, or None when the hostname is unpinned.
    fn config_for(&self, hostname: &str) -> Option<DomainPinConfig>;
}

/// Read-mostly in-memory config source keyed by exact hostname.
#[derive(Debug, Default)]
pub struct InMemoryPinSource {
    configs: RwLock<HashMap<String, DomainPinConfig>>,
}

impl InMemoryPinSource {
    /// Empty source; every hostname is unpinned until inserted.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the policy for its hostname.
    pub fn insert(&self, config: DomainPinConfig) {
        match self.configs.write() {
            Ok(mut map) => {
                map.insert(config.hostname.clone(), config);
            }
            Err(_) => {
                warn!(hostname = %config.hostname, "pin config map poisoned, insert dropped");
            }
        }
    }

    /// Remove the policy for `hostname`, unpinning it.
    pub fn remove(&self, hostname: &str) {
        if let Ok(mut map) = self.configs.write() {
            map.remove(hostname);
        }
    }
}

impl PinConfigSource for InMemoryPinSource {
    fn config_for(&self, hostname: &str) -> Option<DomainPinConfig> {
        match self.configs.read() {
            Ok(map) => map.get(hostname).cloned(),
            Err(_) => {
                // A poisoned map degrades to "unpinned" rather than
                // breaking every handshake.
                warn!(hostname, "pin config map poisoned, treating as unpinned");
                None
            }
        }
    }
}
