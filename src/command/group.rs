//! Composite command.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;

use super::types::{Command, CommandKind, CommandRef};

/// Runs child commands in order, undoing completed children in reverse when one fails.
#[derive(Debug, Clone)]
pub struct GroupCommand {
    kind: CommandKind,
    module: String,
    children: Vec<CommandRef>,
}

impl GroupCommand {
    /// Creates a group carrying out `kind` for `module`.
    #[must_use]
    pub fn new(kind: CommandKind, module: impl Into<String>, children: Vec<CommandRef>) -> Self {
        Self {
            kind,
            module: module.into(),
            children,
        }
    }

    /// Child commands in execution order.
    #[must_use]
    pub fn children(&self) -> &[CommandRef] {
        &self.children
    }
}

#[async_trait]
impl Command for GroupCommand {
    fn kind(&self) -> CommandKind {
        self.kind
    }

    fn module(&self) -> &str {
        &self.module
    }

    async fn execute(&self, token: &CancellationToken) -> Result<()> {
        let mut completed: Vec<&CommandRef> = Vec::with_capacity(self.children.len());

        for child in &self.children {
            if let Err(err) = child.execute(token).await {
                warn!(
                    "'{}' failed, rolling back {} completed step(s): {err}",
                    child.show(),
                    completed.len()
                );
                // Rollback runs to completion even when the cycle is cancelled.
                let rollback_token = CancellationToken::new();
                for done in completed.iter().rev() {
                    if let Err(undo_err) = done.undo(&rollback_token).await {
                        warn!("Failed to undo '{}': {undo_err}", done.show());
                    }
                }
                return Err(err);
            }
            completed.push(child);
        }

        debug!("Completed {} step(s) for {}", completed.len(), self.module);
        Ok(())
    }

    async fn undo(&self, token: &CancellationToken) -> Result<()> {
        for child in self.children.iter().rev() {
            child.undo(token).await?;
        }
        Ok(())
    }

    fn show(&self) -> String {
        self.children
            .iter()
            .map(|c| c.show())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandError;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct Step {
        name: &'static str,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Command for Step {
        fn kind(&self) -> CommandKind {
            CommandKind::Start
        }

        fn module(&self) -> &str {
            "sensor"
        }

        async fn execute(&self, _token: &CancellationToken) -> Result<()> {
            self.log
                .lock()
                .expect("log lock")
                .push(format!("exec {}", self.name));
            if self.fail {
                return Err(CommandError::execution("run", "sensor", "boom").into());
            }
            Ok(())
        }

        async fn undo(&self, _token: &CancellationToken) -> Result<()> {
            self.log
                .lock()
                .expect("log lock")
                .push(format!("undo {}", self.name));
            Ok(())
        }

        fn show(&self) -> String {
            self.name.to_string()
        }
    }

    fn step(name: &'static str, fail: bool, log: &Arc<Mutex<Vec<String>>>) -> CommandRef {
        Arc::new(Step {
            name,
            fail,
            log: Arc::clone(log),
        })
    }

    #[tokio::test]
    async fn test_children_run_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let group = GroupCommand::new(
            CommandKind::Create,
            "sensor",
            vec![step("a", false, &log), step("b", false, &log)],
        );

        group
            .execute(&CancellationToken::new())
            .await
            .expect("group should succeed");

        assert_eq!(*log.lock().expect("log lock"), vec!["exec a", "exec b"]);
        assert_eq!(group.show(), "a; b");
        assert_eq!(group.kind(), CommandKind::Create);
    }

    #[tokio::test]
    async fn test_failure_undoes_completed_children_in_reverse() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let group = GroupCommand::new(
            CommandKind::Create,
            "sensor",
            vec![
                step("a", false, &log),
                step("b", false, &log),
                step("c", true, &log),
                step("d", false, &log),
            ],
        );

        let result = group.execute(&CancellationToken::new()).await;

        assert!(result.is_err());
        assert_eq!(
            *log.lock().expect("log lock"),
            vec!["exec a", "exec b", "exec c", "undo b", "undo a"]
        );
    }
}
