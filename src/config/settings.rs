//! Engine settings.
//!
//! These types map to the engine settings YAML file. Every section and field
//! has a default, so an empty file yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SettingsError};
use crate::restart::BackoffConfig;

/// Largest accepted backoff exponent.
pub const MAX_CAP_EXPONENT: u32 = 16;

/// Root settings for the reconciliation engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct EngineSettings {
    /// Restart policy settings.
    pub restart: RestartSettings,
    /// Plan runner settings.
    pub runner: RunnerSettings,
    /// Module-state store settings.
    pub store: StoreSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Restart policy and backoff settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RestartSettings {
    /// Restart count at which a module is given up on.
    pub max_restart_count: u32,
    /// Base cool-off duration in seconds.
    pub cool_off_unit_secs: u64,
    /// Largest exponent applied to the cool-off unit.
    pub cap_exponent: u32,
    /// Healthy run time in seconds after which the restart count resets.
    pub intensive_care_secs: u64,
}

/// Plan runner settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerSettings {
    /// Attempts per command before it is recorded as failed.
    pub max_attempts: u32,
}

/// Module-state store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct StoreSettings {
    /// Directory of the file store; in-memory store when unset.
    pub path: Option<PathBuf>,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive (e.g. `info`, `edge_reconciler=debug`).
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for RestartSettings {
    fn default() -> Self {
        Self {
            max_restart_count: 5,
            cool_off_unit_secs: 10,
            cap_exponent: 5,
            intensive_care_secs: 600,
        }
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            json: false,
        }
    }
}

impl RestartSettings {
    /// Backoff parameters derived from these settings.
    #[must_use]
    pub const fn backoff(&self) -> BackoffConfig {
        BackoffConfig::new(Duration::from_secs(self.cool_off_unit_secs), self.cap_exponent)
    }
}

impl EngineSettings {
    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<()> {
        if self.restart.cool_off_unit_secs == 0 {
            return Err(SettingsError::invalid(
                "restart.cool_off_unit_secs",
                "must be greater than zero",
            )
            .into());
        }

        if self.restart.cap_exponent > MAX_CAP_EXPONENT {
            return Err(SettingsError::invalid(
                "restart.cap_exponent",
                format!("must be at most {MAX_CAP_EXPONENT}"),
            )
            .into());
        }

        if self.runner.max_attempts == 0 {
            return Err(
                SettingsError::invalid("runner.max_attempts", "must be at least 1").into(),
            );
        }

        if self.logging.level.trim().is_empty() {
            return Err(SettingsError::invalid("logging.level", "cannot be empty").into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EdgeError;

    #[test]
    fn test_defaults_are_valid() {
        let settings = EngineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.restart.max_restart_count, 5);
        assert_eq!(settings.runner.max_attempts, 3);
        assert!(settings.store.path.is_none());
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let mut settings = EngineSettings::default();
        settings.runner.max_attempts = 0;

        assert!(matches!(
            settings.validate(),
            Err(EdgeError::Settings(SettingsError::Invalid { field, .. })) if field == "runner.max_attempts"
        ));
    }

    #[test]
    fn test_large_exponent_rejected() {
        let mut settings = EngineSettings::default();
        settings.restart.cap_exponent = 40;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_backoff_from_settings() {
        let settings = RestartSettings {
            cool_off_unit_secs: 2,
            cap_exponent: 1,
            ..RestartSettings::default()
        };
        let backoff = settings.backoff();

        assert_eq!(backoff.window(0), Duration::from_secs(2));
        assert_eq!(backoff.window(9), Duration::from_secs(4));
    }
}
