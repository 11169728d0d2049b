//! Commands for a single-host container runtime.

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{CommandError, PlanError, Result};
use crate::module::{Module, ModuleIdentity, ModuleStatus, RegistryCredentials, RuntimeInfo};

use super::factory::{CommandFactory, validate_container_module};
use super::group::GroupCommand;
use super::types::{Command, CommandKind, CommandRef, ensure_not_cancelled};

/// Container runtime on the local host.
#[async_trait]
pub trait RuntimeClient: Send + Sync {
    /// Pulls an image.
    async fn pull(
        &self,
        image: &str,
        credentials: Option<&RegistryCredentials>,
        token: &CancellationToken,
    ) -> Result<()>;

    /// Creates a container for the module without starting it.
    async fn create(
        &self,
        module: &Module,
        identity: Option<&ModuleIdentity>,
        token: &CancellationToken,
    ) -> Result<()>;

    /// Starts the module's container.
    async fn start(&self, name: &str, token: &CancellationToken) -> Result<()>;

    /// Stops the module's container.
    async fn stop(&self, name: &str, token: &CancellationToken) -> Result<()>;

    /// Removes the module's container.
    async fn remove(&self, name: &str, token: &CancellationToken) -> Result<()>;

    /// Restarts the module's container.
    async fn restart(&self, name: &str, token: &CancellationToken) -> Result<()>;

    /// Records the declared status on the module's container.
    async fn set_status(
        &self,
        name: &str,
        status: ModuleStatus,
        token: &CancellationToken,
    ) -> Result<()>;
}

/// Single runtime operation.
#[derive(Debug, Clone)]
enum LocalOp {
    Pull {
        image: Option<String>,
        credentials: Option<RegistryCredentials>,
    },
    Create {
        identity: Option<ModuleIdentity>,
    },
    Start,
    Stop,
    Remove,
    Restart,
    SetStatus {
        status: ModuleStatus,
        previous: ModuleStatus,
    },
}

/// One runtime operation bound to a module.
pub struct LocalCommand {
    op: LocalOp,
    module: Module,
    runtime: Arc<dyn RuntimeClient>,
}

impl LocalCommand {
    fn new(op: LocalOp, module: &Module, runtime: &Arc<dyn RuntimeClient>) -> CommandRef {
        Arc::new(Self {
            op,
            module: module.clone(),
            runtime: Arc::clone(runtime),
        })
    }

    fn name(&self) -> &str {
        self.module.name()
    }
}

impl std::fmt::Debug for LocalCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCommand")
            .field("op", &self.op)
            .field("module", &self.module.name())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Command for LocalCommand {
    fn kind(&self) -> CommandKind {
        match self.op {
            LocalOp::Pull { .. } => CommandKind::Pull,
            LocalOp::Create { .. } => CommandKind::Create,
            LocalOp::Start => CommandKind::Start,
            LocalOp::Stop => CommandKind::Stop,
            LocalOp::Remove => CommandKind::Remove,
            LocalOp::Restart => CommandKind::Restart,
            LocalOp::SetStatus { .. } => CommandKind::Update,
        }
    }

    fn module(&self) -> &str {
        self.name()
    }

    async fn execute(&self, token: &CancellationToken) -> Result<()> {
        ensure_not_cancelled(token, self.name())?;
        info!("Executing: {}", self.show());

        match &self.op {
            LocalOp::Pull { image, credentials } => {
                let image = image.as_deref().ok_or_else(|| CommandError::InvalidConfig {
                    module: self.name().to_string(),
                    message: String::from("no image to pull"),
                })?;
                self.runtime.pull(image, credentials.as_ref(), token).await
            }
            LocalOp::Create { identity } => {
                self.runtime
                    .create(&self.module, identity.as_ref(), token)
                    .await
            }
            LocalOp::Start => self.runtime.start(self.name(), token).await,
            LocalOp::Stop => self.runtime.stop(self.name(), token).await,
            LocalOp::Remove => self.runtime.remove(self.name(), token).await,
            LocalOp::Restart => self.runtime.restart(self.name(), token).await,
            LocalOp::SetStatus { status, .. } => {
                self.runtime.set_status(self.name(), *status, token).await
            }
        }
    }

    async fn undo(&self, token: &CancellationToken) -> Result<()> {
        match &self.op {
            LocalOp::Create { .. } => self.runtime.remove(self.name(), token).await,
            LocalOp::Start => self.runtime.stop(self.name(), token).await,
            LocalOp::Stop => self.runtime.start(self.name(), token).await,
            LocalOp::SetStatus { previous, .. } => {
                self.runtime.set_status(self.name(), *previous, token).await
            }
            LocalOp::Pull { .. } | LocalOp::Remove | LocalOp::Restart => {
                debug!("Nothing to undo for: {}", self.show());
                Ok(())
            }
        }
    }

    fn show(&self) -> String {
        let name = self.name();
        match &self.op {
            LocalOp::Pull { image, .. } => {
                format!("docker pull {}", image.as_deref().unwrap_or("<none>"))
            }
            LocalOp::Create { .. } => format!(
                "docker create --name {name} {}",
                self.module.image().unwrap_or("<none>")
            ),
            LocalOp::Start => format!("docker start {name}"),
            LocalOp::Stop => format!("docker stop {name}"),
            LocalOp::Remove => format!("docker rm {name}"),
            LocalOp::Restart => format!("docker restart {name}"),
            LocalOp::SetStatus { status, .. } => format!("docker update {name} --status {status}"),
        }
    }
}

/// Command factory for a single-host container runtime.
#[derive(Clone)]
pub struct LocalCommandFactory {
    runtime: Arc<dyn RuntimeClient>,
    supported_types: Vec<String>,
}

impl LocalCommandFactory {
    /// Creates a factory issuing commands against `runtime`.
    #[must_use]
    pub fn new(runtime: Arc<dyn RuntimeClient>) -> Self {
        Self {
            runtime,
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

impl std::fmt::Debug for LocalCommandFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCommandFactory")
            .field("supported_types", &self.supported_types)
            .finish_non_exhaustive()
    }
}

impl CommandFactory for LocalCommandFactory {
    fn target(&self) -> &'static str {
        "local"
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
        let image = module.image().map(str::to_string);
        let credentials = image
            .as_deref()
            .and_then(|i| runtime_info.credentials_for(i))
            .cloned();

        let mut steps = vec![
            LocalCommand::new(LocalOp::Pull { image, credentials }, module, &self.runtime),
            LocalCommand::new(
                LocalOp::Create {
                    identity: identity.cloned(),
                },
                module,
                &self.runtime,
            ),
        ];
        if module.status() == ModuleStatus::Running {
            steps.push(LocalCommand::new(LocalOp::Start, module, &self.runtime));
        }

        Arc::new(GroupCommand::new(CommandKind::Create, module.name(), steps))
    }

    fn update(&self, current: &Module, desired: &Module) -> CommandRef {
        let mut steps = vec![LocalCommand::new(
            LocalOp::SetStatus {
                status: desired.status(),
                previous: current.status(),
            },
            desired,
            &self.runtime,
        )];
        match desired.status() {
            ModuleStatus::Running => {
                steps.push(LocalCommand::new(LocalOp::Start, desired, &self.runtime));
            }
            ModuleStatus::Stopped => {
                steps.push(LocalCommand::new(LocalOp::Stop, desired, &self.runtime));
            }
            ModuleStatus::Unknown => {}
        }

        Arc::new(GroupCommand::new(CommandKind::Update, desired.name(), steps))
    }

    fn remove(&self, module: &Module) -> CommandRef {
        LocalCommand::new(LocalOp::Remove, module, &self.runtime)
    }

    fn restart(&self, module: &Module) -> CommandRef {
        LocalCommand::new(LocalOp::Restart, module, &self.runtime)
    }

    fn stop(&self, module: &Module) -> CommandRef {
        LocalCommand::new(LocalOp::Stop, module, &self.runtime)
    }
}
