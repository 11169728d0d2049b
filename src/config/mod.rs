//! Configuration for the edge reconciler.
//!
//! This module handles all configuration-related functionality:
//! - Engine settings (restart policy, runner, store, logging) from YAML and `EDGE_*` variables
//! - The deployment manifest serving as a file-backed desired state
//! - Module fingerprints for diagnostics

mod hash;
mod manifest;
mod parser;
mod settings;

pub use hash::ConfigHasher;
pub use manifest::{DeploymentManifest, FileConfigSource};
pub use parser::SettingsParser;
pub use settings::{
    EngineSettings, LoggingSettings, MAX_CAP_EXPONENT, RestartSettings, RunnerSettings,
    StoreSettings,
};
