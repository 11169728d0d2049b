//! Module value types.
//!
//! A [`Module`] is the declared description of one deployable unit. Modules
//! reported by an environment may also carry an [`ObservedState`], which is a
//! snapshot annotation and never part of the module's value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Desired status of a module.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    /// Module should be running.
    #[default]
    Running,
    /// Module should be stopped.
    Stopped,
    /// Status is unknown.
    Unknown,
}

/// Per-module rule governing automatic restarts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum RestartPolicy {
    /// Never restart automatically.
    Never,
    /// Restart when the module exited with a failure.
    OnFailure,
    /// Restart when the module failed or its health is unknown.
    OnUnhealthy,
    /// Restart whenever the module is not running.
    #[default]
    Always,
}

/// Status reported by the execution runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeStatus {
    /// Process is running.
    Running,
    /// Process is stopped.
    Stopped,
    /// Process exited with a failure.
    Failed,
    /// Runtime is holding the module back between restarts.
    Backoff,
    /// Status is unknown.
    #[default]
    Unknown,
}

/// Observed runtime details of a module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ObservedState {
    /// Status reported by the runtime.
    pub runtime_status: RuntimeStatus,
    /// Exit code of the last run, if the module exited.
    #[serde(default)]
    pub exit_code: Option<i64>,
    /// When the current run started.
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// When the last run exited.
    #[serde(default)]
    pub exited_at: Option<DateTime<Utc>>,
}

/// A named deployable unit.
///
/// Equality covers every declared field, configuration included, and ignores
/// the observed runtime state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    name: String,
    version: String,
    #[serde(rename = "type")]
    module_type: String,
    #[serde(default)]
    status: ModuleStatus,
    #[serde(default)]
    restart_policy: RestartPolicy,
    #[serde(default)]
    config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    observed: Option<ObservedState>,
}

/// Identity the control plane provisioned for a module.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleIdentity {
    /// Identifier of the module in the control plane.
    pub module_id: String,
    /// Generation of the identity.
    #[serde(default)]
    pub generation_id: Option<String>,
}

/// Credentials for a container registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegistryCredentials {
    /// Registry address (e.g. `registry.example.com`).
    pub address: String,
    /// User name.
    pub username: String,
    /// Password or token.
    pub password: String,
}

/// Runtime-level configuration delivered alongside the desired modules.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeInfo {
    /// Runtime kind (e.g. `docker`).
    #[serde(default = "default_runtime_kind")]
    pub kind: String,
    /// Registry credentials available for image pulls.
    #[serde(default)]
    pub registry_credentials: Vec<RegistryCredentials>,
}

fn default_runtime_kind() -> String {
    String::from("docker")
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            kind: default_runtime_kind(),
            registry_credentials: Vec::new(),
        }
    }
}

impl RuntimeInfo {
    /// Finds the credentials whose registry address prefixes the image.
    #[must_use]
    pub fn credentials_for(&self, image: &str) -> Option<&RegistryCredentials> {
        self.registry_credentials
            .iter()
            .find(|c| image.starts_with(&format!("{}/", c.address)))
    }
}

impl Module {
    /// Creates a module with the default status (`running`) and restart policy (`always`).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        module_type: impl Into<String>,
        config: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            module_type: module_type.into(),
            status: ModuleStatus::default(),
            restart_policy: RestartPolicy::default(),
            config,
            observed: None,
        }
    }

    /// Returns a copy with a different desired status.
    #[must_use]
    pub fn with_status(mut self, status: ModuleStatus) -> Self {
        self.status = status;
        self
    }

    /// Returns a copy with a different restart policy.
    #[must_use]
    pub fn with_restart_policy(mut self, restart_policy: RestartPolicy) -> Self {
        self.restart_policy = restart_policy;
        self
    }

    /// Returns a copy annotated with observed runtime state.
    #[must_use]
    pub fn with_observed(mut self, observed: ObservedState) -> Self {
        self.observed = Some(observed);
        self
    }

    /// Module name (identity key).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Type tag selecting the command mapping.
    #[must_use]
    pub fn module_type(&self) -> &str {
        &self.module_type
    }

    /// Desired status.
    #[must_use]
    pub const fn status(&self) -> ModuleStatus {
        self.status
    }

    /// Restart policy.
    #[must_use]
    pub const fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    /// Opaque configuration blob.
    #[must_use]
    pub const fn config(&self) -> &serde_json::Value {
        &self.config
    }

    /// Observed runtime state, if this module came from an environment.
    #[must_use]
    pub const fn observed(&self) -> Option<&ObservedState> {
        self.observed.as_ref()
    }

    /// Container image from the configuration, if present.
    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.config.get("image").and_then(serde_json::Value::as_str)
    }

    /// Normalized identity used to detect ambiguous names.
    #[must_use]
    pub fn identity_key(&self) -> String {
        normalize_identity(&self.name)
    }

    /// Returns true if the two modules differ only in their desired status.
    #[must_use]
    pub fn differs_only_in_status(&self, other: &Self) -> bool {
        self.status != other.status
            && self.name == other.name
            && self.version == other.version
            && self.module_type == other.module_type
            && self.restart_policy == other.restart_policy
            && self.config == other.config
    }
}

/// Normalizes a module name or identity key for collision checks.
#[must_use]
pub fn normalize_identity(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

impl PartialEq for Module {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.module_type == other.module_type
            && self.status == other.status
            && self.restart_policy == other.restart_policy
            && self.config == other.config
    }
}

impl Eq for Module {}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Never => "never",
            Self::OnFailure => "on-failure",
            Self::OnUnhealthy => "on-unhealthy",
            Self::Always => "always",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for RuntimeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
            Self::Backoff => "backoff",
            Self::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({} {}, {})", self.name, self.module_type, self.version, self.status)
    }
}
