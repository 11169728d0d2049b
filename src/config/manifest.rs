//! Deployment manifest.
//!
//! A YAML document declaring the desired modules, the runtime configuration
//! and any provisioned identities. [`FileConfigSource`] serves it to the
//! agent as its desired state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::agent::{ConfigSource, DesiredState};
use crate::error::{Result, SourceError};
use crate::module::{Module, ModuleIdentity, ModuleSet, RuntimeInfo};
use crate::planner::PlanContext;

/// Parsed deployment manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DeploymentManifest {
    /// Runtime-level configuration.
    #[serde(default)]
    pub runtime: RuntimeInfo,
    /// Desired modules.
    #[serde(default)]
    pub modules: Vec<Module>,
    /// Provisioned identities by module name.
    #[serde(default)]
    pub identities: BTreeMap<String, ModuleIdentity>,
}

impl DeploymentManifest {
    /// Parses a manifest from YAML.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::ManifestParse`] if the YAML is invalid.
    pub fn parse(content: &str, source: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| {
            SourceError::ManifestParse {
                path: source.to_path_buf(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Builds the desired module set.
    ///
    /// # Errors
    ///
    /// Returns an error if two modules share a name.
    pub fn module_set(&self) -> Result<ModuleSet> {
        Ok(ModuleSet::create(self.modules.iter().cloned())?)
    }

    /// Consumes the manifest into the desired state it declares.
    ///
    /// # Errors
    ///
    /// Returns an error if two modules share a name.
    pub fn into_desired_state(self) -> Result<DesiredState> {
        Ok(DesiredState {
            modules: ModuleSet::create(self.modules)?,
            context: PlanContext {
                runtime_info: self.runtime,
                identities: self.identities,
            },
        })
    }
}

/// Config source backed by a manifest file, re-read on every fetch.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    /// Creates a source reading `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the manifest.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and parses the manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(&self) -> Result<DeploymentManifest> {
        debug!("Reading deployment manifest from {}", self.path.display());
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            SourceError::config_source(format!("cannot read {}: {e}", self.path.display()))
        })?;
        DeploymentManifest::parse(&content, &self.path)
    }
}

#[async_trait]
impl ConfigSource for FileConfigSource {
    async fn get_desired_state(&self) -> Result<DesiredState> {
        let desired = self.load().await?.into_desired_state()?;
        info!(
            "Loaded {} desired module(s) from {}",
            desired.modules.len(),
            self.path.display()
        );
        Ok(desired)
    }

    async fn get_module_set(&self) -> Result<ModuleSet> {
        let modules = self.load().await?.module_set()?;
        info!(
            "Loaded {} desired module(s) from {}",
            modules.len(),
            self.path.display()
        );
        Ok(modules)
    }

    async fn get_runtime_info(&self) -> Result<RuntimeInfo> {
        Ok(self.load().await?.runtime)
    }

    async fn get_identities(&self) -> Result<BTreeMap<String, ModuleIdentity>> {
        Ok(self.load().await?.identities)
    }
}
