//! Command abstraction.
//!
//! A command is an executable, undoable and describable unit of work bound to
//! exactly one module. Commands are built by a
//! [`CommandFactory`](super::CommandFactory) during planning and executed by
//! the [`PlanRunner`](crate::planner::PlanRunner).

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{CommandError, Result};

/// Shared handle to a command.
pub type CommandRef = Arc<dyn Command>;

/// Lifecycle intent a command carries out.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    /// Bring a new module to its desired status.
    Create,
    /// Change a module in place.
    Update,
    /// Remove a module.
    Remove,
    /// Restart a module.
    Restart,
    /// Stop a module.
    Stop,
    /// Start a module.
    Start,
    /// Fetch a module's image.
    Pull,
    /// Record a restart in the module-state store.
    RecordRestart,
    /// Clear a module's restart count.
    ResetRestartState,
}

/// An executable, undoable, describable unit of work.
#[async_trait]
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Lifecycle intent of this command.
    fn kind(&self) -> CommandKind;

    /// Name of the module this command is bound to.
    fn module(&self) -> &str;

    /// Executes the command.
    ///
    /// Implementations observe `token` and return promptly once it fires.
    async fn execute(&self, token: &CancellationToken) -> Result<()>;

    /// Reverts a successful execution, where that is possible.
    async fn undo(&self, token: &CancellationToken) -> Result<()>;

    /// Human-readable description for audit logs.
    fn show(&self) -> String;
}

/// Fails with a cancellation error if `token` has fired.
///
/// # Errors
///
/// Returns [`CommandError::Cancelled`] when the token is cancelled.
pub fn ensure_not_cancelled(token: &CancellationToken, module: &str) -> Result<()> {
    if token.is_cancelled() {
        return Err(CommandError::cancelled(module).into());
    }
    Ok(())
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Remove => "remove",
            Self::Restart => "restart",
            Self::Stop => "stop",
            Self::Start => "start",
            Self::Pull => "pull",
            Self::RecordRestart => "record-restart",
            Self::ResetRestartState => "reset-restart-state",
        };
        write!(f, "{s}")
    }
}
