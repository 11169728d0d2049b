//! Error types for the edge reconciler.
//!
//! This module provides the error hierarchy for every stage of a
//! reconciliation cycle: module snapshots, planning, command execution,
//! collaborator fetches, module-state storage and engine settings.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the edge reconciler.
#[derive(Debug, Error)]
pub enum EdgeError {
    /// Module snapshot errors.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Command execution errors.
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Collaborator fetch errors.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Module-state store errors.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Engine settings errors.
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Errors raised while building module snapshots.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModuleError {
    /// Two modules in one set share a name.
    #[error("Duplicate module name: {name}")]
    DuplicateModule {
        /// The duplicated name.
        name: String,
    },

    /// A module name is empty or blank.
    #[error("Module name cannot be empty")]
    EmptyName,
}

/// Planning errors. Any of these aborts planning; no partial plan is produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// Two distinct modules normalize to the same identity.
    #[error("Invalid identity: modules '{first}' and '{second}' resolve to the same identity")]
    InvalidIdentity {
        /// First module name.
        first: String,
        /// Conflicting module name.
        second: String,
    },

    /// A module variant has no known command mapping.
    #[error("Invalid module '{name}' for the {target} target: {reason}")]
    InvalidModule {
        /// Module name.
        name: String,
        /// Runtime target the planner was built for.
        target: String,
        /// Why the module cannot be mapped to commands.
        reason: String,
    },
}

impl PlanError {
    /// Creates an invalid-module error.
    #[must_use]
    pub fn invalid_module(
        name: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidModule {
            name: name.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }
}

/// Command execution errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command failed while executing.
    #[error("Failed to {operation} module '{module}': {message}")]
    ExecutionFailed {
        /// Operation being performed.
        operation: String,
        /// Module the command is bound to.
        module: String,
        /// Description of the failure.
        message: String,
    },

    /// The command configuration is unusable.
    #[error("Invalid configuration for module '{module}': {message}")]
    InvalidConfig {
        /// Module the command is bound to.
        module: String,
        /// Description of the problem.
        message: String,
    },

    /// The command observed the cancellation signal.
    #[error("Command for module '{module}' was cancelled")]
    Cancelled {
        /// Module the command is bound to.
        module: String,
    },
}

/// Errors fetching state from the external collaborators.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The desired-state source could not be read.
    #[error("Config source unavailable: {message}")]
    ConfigSourceUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// The execution environment could not be queried.
    #[error("Environment unavailable: {message}")]
    EnvironmentUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// A deployment manifest could not be parsed.
    #[error("Failed to parse deployment manifest {path}: {message}")]
    ManifestParse {
        /// Path of the manifest.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },
}

/// Module-state store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("Module state store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// Persisted state is corrupted.
    #[error("Module state is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("Module state serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// No entry exists for the key.
    #[error("No module state for key '{key}'")]
    NotFound {
        /// Missing key.
        key: String,
    },
}

/// Engine settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file was not found.
    #[error("Settings file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The settings could not be parsed.
    #[error("Failed to parse settings: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// A setting has an unusable value.
    #[error("Invalid setting {field}: {message}")]
    Invalid {
        /// Setting name.
        field: String,
        /// Description of the problem.
        message: String,
    },

    /// Logging could not be initialized.
    #[error("Failed to initialize logging: {message}")]
    Logging {
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, EdgeError>;

impl EdgeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Command(CommandError::ExecutionFailed { .. })
                | Self::Store(StoreError::Unavailable { .. })
                | Self::Io(_)
        )
    }

    /// Returns true if this error comes from a cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Command(CommandError::Cancelled { .. }))
    }
}

impl CommandError {
    /// Creates an execution failure.
    #[must_use]
    pub fn execution(
        operation: impl Into<String>,
        module: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ExecutionFailed {
            operation: operation.into(),
            module: module.into(),
            message: message.into(),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(module: impl Into<String>) -> Self {
        Self::Cancelled {
            module: module.into(),
        }
    }
}

impl SourceError {
    /// Creates a config source error.
    #[must_use]
    pub fn config_source(message: impl Into<String>) -> Self {
        Self::ConfigSourceUnavailable {
            message: message.into(),
        }
    }

    /// Creates an environment error.
    #[must_use]
    pub fn environment(message: impl Into<String>) -> Self {
        Self::EnvironmentUnavailable {
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Creates an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl SettingsError {
    /// Creates an invalid-setting error for a specific field.
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}
