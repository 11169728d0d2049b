//! Module configuration hashing.
//!
//! This module provides deterministic fingerprints of module declarations,
//! used in command descriptions and diagnostics to tell revisions apart.

use sha2::{Digest, Sha256};

use crate::module::Module;

/// Hasher for computing module fingerprints.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigHasher;

impl ConfigHasher {
    /// Creates a new configuration hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a hash of every declared field of a module.
    ///
    /// Observed runtime state does not contribute.
    #[must_use]
    pub fn hash_module(&self, module: &Module) -> String {
        let mut hasher = Sha256::new();

        hasher.update(module.name().as_bytes());
        hasher.update([0u8]);
        hasher.update(module.version().as_bytes());
        hasher.update([0u8]);
        hasher.update(module.module_type().as_bytes());
        hasher.update([0u8]);
        hasher.update(module.status().to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(module.restart_policy().to_string().as_bytes());
        hasher.update([0u8]);

        // serde_json::Value maps are ordered, so this encoding is stable
        hasher.update(module.config().to_string().as_bytes());

        hex::encode(hasher.finalize())
    }

    /// Computes the short fingerprint (first 8 characters) of a module.
    #[must_use]
    pub fn short_hash(&self, module: &Module) -> String {
        self.hash_module(module).chars().take(8).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ObservedState, RuntimeStatus};
    use serde_json::json;

    #[test]
    fn test_hash_deterministic() {
        let hasher = ConfigHasher::new();
        let module = Module::new("sensor", "1.0", "docker", json!({"image": "a", "env": {"B": "1", "A": "2"}}));

        assert_eq!(hasher.hash_module(&module), hasher.hash_module(&module.clone()));
    }

    #[test]
    fn test_config_changes_hash() {
        let hasher = ConfigHasher::new();
        let a = Module::new("sensor", "1.0", "docker", json!({"image": "a"}));
        let b = Module::new("sensor", "1.0", "docker", json!({"image": "b"}));

        assert_ne!(hasher.hash_module(&a), hasher.hash_module(&b));
    }

    #[test]
    fn test_observed_state_ignored() {
        let hasher = ConfigHasher::new();
        let module = Module::new("sensor", "1.0", "docker", json!({"image": "a"}));
        let observed = module.clone().with_observed(ObservedState {
            runtime_status: RuntimeStatus::Failed,
            ..ObservedState::default()
        });

        assert_eq!(hasher.hash_module(&module), hasher.hash_module(&observed));
    }

    #[test]
    fn test_short_hash() {
        let hasher = ConfigHasher::new();
        let module = Module::new("sensor", "1.0", "docker", json!({}));
        let short = hasher.short_hash(&module);

        assert_eq!(short.len(), 8);
        assert!(hasher.hash_module(&module).starts_with(&short));
    }
}
