//! Commands and the factories that build them.
//!
//! Every change the engine makes to a runtime is a [`Command`]: executable,
//! undoable, describable, and bound to one module. A [`CommandFactory`] maps
//! lifecycle intents onto commands for a specific runtime target.

mod cluster;
mod factory;
mod group;
mod local;
mod state;
mod types;

pub use cluster::{ClusterClient, ClusterCommand, ClusterCommandFactory};
pub use factory::CommandFactory;
pub use group::GroupCommand;
pub use local::{LocalCommand, LocalCommandFactory, RuntimeClient};
pub use state::{ModuleStateStore, RecordRestartCommand, ResetRestartStateCommand};
pub use types::{Command, CommandKind, CommandRef, ensure_not_cancelled};

#[cfg(test)]
pub(crate) use local::tests::RecordingRuntime;
#[cfg(test)]
pub(crate) use state::tests::UnreachableStore;
