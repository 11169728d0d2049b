//! Settings parser for loading engine settings.
//!
//! This module handles loading settings from YAML files and environment
//! variables, with proper precedence and error handling.

use crate::error::{Result, SettingsError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::settings::EngineSettings;

/// Settings parser for loading engine settings.
#[derive(Debug, Default)]
pub struct SettingsParser {
    /// Base path for resolving the `.env` file.
    base_path: Option<PathBuf>,
}

impl SettingsParser {
    /// Creates a new settings parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<EngineSettings> {
        let path = path.as_ref();
        info!("Loading engine settings from: {}", path.display());

        if !path.exists() {
            return Err(SettingsError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path).map_err(|e| SettingsError::ParseError {
            message: format!("Failed to read file: {e}"),
            location: Some(path.display().to_string()),
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<EngineSettings> {
        debug!("Parsing YAML settings");

        if content.trim().is_empty() {
            return Ok(EngineSettings::default());
        }

        let settings: EngineSettings = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            SettingsError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            }
        })?;

        Ok(settings)
    }

    /// Loads settings with `.env` and environment variable overrides, then validates them.
    ///
    /// Environment variables are checked in the format `EDGE_<KEY>`
    /// (e.g., `EDGE_MAX_RESTART_COUNT`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<EngineSettings> {
        self.load_dotenv()?;
        let mut settings = self.load_file(path)?;

        Self::apply_overrides(&mut settings, |key| std::env::var(key).ok())?;
        settings.validate()?;

        Ok(settings)
    }

    /// Applies overrides looked up by `lookup` to the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if an override cannot be parsed.
    pub fn apply_overrides(
        settings: &mut EngineSettings,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<()> {
        if let Some(value) = lookup("EDGE_MAX_RESTART_COUNT") {
            debug!("Overriding restart.max_restart_count from environment");
            settings.restart.max_restart_count = parse_override("EDGE_MAX_RESTART_COUNT", &value)?;
        }

        if let Some(value) = lookup("EDGE_COOL_OFF_UNIT_SECS") {
            debug!("Overriding restart.cool_off_unit_secs from environment");
            settings.restart.cool_off_unit_secs = parse_override("EDGE_COOL_OFF_UNIT_SECS", &value)?;
        }

        if let Some(value) = lookup("EDGE_CAP_EXPONENT") {
            debug!("Overriding restart.cap_exponent from environment");
            settings.restart.cap_exponent = parse_override("EDGE_CAP_EXPONENT", &value)?;
        }

        if let Some(value) = lookup("EDGE_INTENSIVE_CARE_SECS") {
            debug!("Overriding restart.intensive_care_secs from environment");
            settings.restart.intensive_care_secs =
                parse_override("EDGE_INTENSIVE_CARE_SECS", &value)?;
        }

        if let Some(value) = lookup("EDGE_MAX_ATTEMPTS") {
            debug!("Overriding runner.max_attempts from environment");
            settings.runner.max_attempts = parse_override("EDGE_MAX_ATTEMPTS", &value)?;
        }

        if let Some(value) = lookup("EDGE_STATE_PATH") {
            debug!("Overriding store.path from environment");
            settings.store.path = Some(PathBuf::from(value));
        }

        if let Some(value) = lookup("EDGE_LOG_LEVEL") {
            debug!("Overriding logging.level from environment");
            settings.logging.level = value;
        }

        if let Some(value) = lookup("EDGE_LOG_JSON") {
            debug!("Overriding logging.json from environment");
            settings.logging.json = parse_override("EDGE_LOG_JSON", &value)?;
        }

        Ok(())
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| SettingsError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Parses one override value.
fn parse_override<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        warn!("Rejecting unparsable override {key}={value}");
        SettingsError::invalid(key, format!("cannot parse '{value}': {e}")).into()
    })
}
