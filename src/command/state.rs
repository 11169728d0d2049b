//! Commands that keep the restart bookkeeping in the module-state store.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{EdgeError, Result, StoreError};
use crate::state::{EntityStore, ModuleState};

use super::types::{Command, CommandKind, ensure_not_cancelled};

/// Shared module-state store handle.
pub type ModuleStateStore = Arc<dyn EntityStore<ModuleState>>;

/// Increments a module's restart count and stamps the restart time.
pub struct RecordRestartCommand {
    module: String,
    store: ModuleStateStore,
}

impl RecordRestartCommand {
    /// Creates the command for `module`.
    #[must_use]
    pub fn new(module: impl Into<String>, store: ModuleStateStore) -> Self {
        Self {
            module: module.into(),
            store,
        }
    }
}

impl std::fmt::Debug for RecordRestartCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordRestartCommand")
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Command for RecordRestartCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::RecordRestart
    }

    fn module(&self) -> &str {
        &self.module
    }

    async fn execute(&self, token: &CancellationToken) -> Result<()> {
        ensure_not_cancelled(token, &self.module)?;
        let now = Utc::now();
        match self
            .store
            .put_or_update(&self.module, ModuleState::first_restart(now), &move |s: &ModuleState| {
                s.record_restart(now)
            })
            .await
        {
            Ok(state) => {
                debug!("Recorded restart of {}: {state}", self.module);
                Ok(())
            }
            // Restarting takes precedence over bookkeeping; backoff may be bypassed.
            Err(EdgeError::Store(StoreError::Unavailable { message })) => {
                warn!(
                    "Could not record restart of {}, restarting anyway: {message}",
                    self.module
                );
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn undo(&self, _token: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn show(&self) -> String {
        format!("record restart of {}", self.module)
    }
}

/// Clears a module's restart count once it has run stably.
pub struct ResetRestartStateCommand {
    module: String,
    store: ModuleStateStore,
}

impl ResetRestartStateCommand {
    /// Creates the command for `module`.
    #[must_use]
    pub fn new(module: impl Into<String>, store: ModuleStateStore) -> Self {
        Self {
            module: module.into(),
            store,
        }
    }
}

impl std::fmt::Debug for ResetRestartStateCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetRestartStateCommand")
            .field("module", &self.module)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Command for ResetRestartStateCommand {
    fn kind(&self) -> CommandKind {
        CommandKind::ResetRestartState
    }

    fn module(&self) -> &str {
        &self.module
    }

    async fn execute(&self, token: &CancellationToken) -> Result<()> {
        ensure_not_cancelled(token, &self.module)?;
        match self.store.update(&self.module, &|s: &ModuleState| s.reset()).await {
            Ok(_) | Err(EdgeError::Store(StoreError::NotFound { .. })) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn undo(&self, _token: &CancellationToken) -> Result<()> {
        Ok(())
    }

    fn show(&self) -> String {
        format!("reset restart count of {}", self.module)
    }
}
