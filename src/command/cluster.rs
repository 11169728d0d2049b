//! Commands for a cluster orchestrator.
//!
//! Cluster targets are declarative: creating and updating a module both apply
//! its manifest, and stopping scales it to zero replicas.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{PlanError, Result};
use crate::module::{Module, ModuleIdentity, ModuleStatus, RuntimeInfo};

use super::factory::{CommandFactory, validate_container_module};
use super::group::GroupCommand;
use super::types::{Command, CommandKind, CommandRef, ensure_not_cancelled};

/// Cluster orchestrator API.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Applies the module's workload manifest.
    async fn apply(
        &self,
        module: &Module,
        runtime_info: &RuntimeInfo,
        identity: Option<&ModuleIdentity>,
        token: &CancellationToken,
    ) -> Result<()>;

    /// Deletes the module's workload.
    async fn delete(&self, name: &str, token: &CancellationToken) -> Result<()>;

    /// Triggers a rolling restart of the module's workload.
    async fn rollout_restart(&self, name: &str, token: &CancellationToken) -> Result<()>;

    /// Scales the module's workload.
    async fn scale(&self, name: &str, replicas: u32, token: &CancellationToken) -> Result<()>;
}

#[derive(Debug, Clone)]
enum ClusterOp {
    Apply {
        runtime_info: RuntimeInfo,
        identity: Option<ModuleIdentity>,
    },
    Delete,
    RolloutRestart,
    Scale {
        replicas: u32,
    },
}

/// One orchestrator operation bound to a module.
pub struct ClusterCommand {
    op: ClusterOp,
    module: Module,
    client: Arc<dyn ClusterClient>,
}

impl ClusterCommand {
    fn new(op: ClusterOp, module: &Module, client: &Arc<dyn ClusterClient>) -> CommandRef {
        Arc::new(Self {
            op,
            module: module.clone(),
            client: Arc::clone(client),
        })
    }
}

impl std::fmt::Debug for ClusterCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterCommand")
            .field("op", &self.op)
            .field("module", &self.module.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Command for ClusterCommand {
    fn kind(&self) -> CommandKind {
        match self.op {
            ClusterOp::Apply { .. } => CommandKind::Create,
            ClusterOp::Delete => CommandKind::Remove,
            ClusterOp::RolloutRestart => CommandKind::Restart,
            ClusterOp::Scale { replicas: 0 } => CommandKind::Stop,
            ClusterOp::Scale { .. } => CommandKind::Start,
        }
    }

    fn module(&self) -> &str {
        self.module.name()
    }

    async fn execute(&self, token: &CancellationToken) -> Result<()> {
        ensure_not_cancelled(token, self.module.name())?;
        info!("Executing: {}", self.show());

        let name = self.module.name();
        match &self.op {
            ClusterOp::Apply {
                runtime_info,
                identity,
                ..
            } => {
                self.client
                    .apply(&self.module, runtime_info, identity.as_ref(), token)
                    .await
            }
            ClusterOp::Delete => self.client.delete(name, token).await,
            ClusterOp::RolloutRestart => self.client.rollout_restart(name, token).await,
            ClusterOp::Scale { replicas } => self.client.scale(name, *replicas, token).await,
        }
    }

    async fn undo(&self, token: &CancellationToken) -> Result<()> {
        match &self.op {
            ClusterOp::Apply { .. } => self.client.delete(self.module.name(), token).await,
            ClusterOp::Scale { replicas: 0 } => self.client.scale(self.module.name(), 1, token).await,
            _ => {
                debug!("Nothing to undo for: {}", self.show());
                Ok(())
            }
        }
    }

    fn show(&self) -> String {
        let name = self.module.name();
        match &self.op {
            ClusterOp::Apply { .. } => format!(
                "kubectl apply deployment/{name} image={}",
                self.module.image().unwrap_or("<none>")
            ),
            ClusterOp::Delete => format!("kubectl delete deployment/{name}"),
            ClusterOp::RolloutRestart => format!("kubectl rollout restart deployment/{name}"),
            ClusterOp::Scale { replicas } => {
                format!("kubectl scale deployment/{name} --replicas={replicas}")
            }
        }
    }
}

/// Command factory for a cluster orchestrator.
#[derive(Clone)]
pub struct ClusterCommandFactory {
    client: Arc<dyn ClusterClient>,
    supported_types: Vec<String>,
}

impl ClusterCommandFactory {
    /// Creates a factory issuing commands against `client`.
    #[must_use]
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self {
            client,
            supported_types: vec![String::from("docker")],
        }
    }

    /// Replaces the module types this factory accepts.
    #[must_use]
    pub fn with_supported_types(mut self, types: impl IntoIterator<Item = String>) -> Self {
        self.supported_types = types.into_iter().collect();
        self
    }
}

impl std::fmt::Debug for ClusterCommandFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterCommandFactory")
            .field("supported_types", &self.supported_types)
            .finish_non_exhaustive()
    }
}

impl CommandFactory for ClusterCommandFactory {
    fn target(&self) -> &'static str {
        "cluster"
    }

    fn validate(&self, module: &Module) -> std::result::Result<(), PlanError> {
        validate_container_module(module, self.target(), &self.supported_types)
    }

    fn create(
        &self,
        module: &Module,
        runtime_info: &RuntimeInfo,
        identity: Option<&ModuleIdentity>,
    ) -> CommandRef {
        ClusterCommand::new(
            ClusterOp::Apply {
                runtime_info: runtime_info.clone(),
                identity: identity.cloned(),
            },
            module,
            &self.client,
        )
    }

    fn update(&self, _current: &Module, desired: &Module) -> CommandRef {
        let steps = match desired.status() {
            ModuleStatus::Running => vec![ClusterCommand::new(
                ClusterOp::Scale { replicas: 1 },
                desired,
                &self.client,
            )],
            ModuleStatus::Stopped => vec![ClusterCommand::new(
                ClusterOp::Scale { replicas: 0 },
                desired,
                &self.client,
            )],
            ModuleStatus::Unknown => Vec::new(),
        };
        Arc::new(GroupCommand::new(CommandKind::Update, desired.name(), steps))
    }

    fn remove(&self, module: &Module) -> CommandRef {
        ClusterCommand::new(ClusterOp::Delete, module, &self.client)
    }

    fn restart(&self, module: &Module) -> CommandRef {
        ClusterCommand::new(ClusterOp::RolloutRestart, module, &self.client)
    }

    fn stop(&self, module: &Module) -> CommandRef {
        ClusterCommand::new(ClusterOp::Scale { replicas: 0 }, module, &self.client)
    }
}
