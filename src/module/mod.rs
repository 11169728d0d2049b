//! Module model: value types, immutable snapshots and structural diffs.

mod set;
mod types;

pub use set::{Diff, ModuleSet};
pub use types::{
    normalize_identity, Module, ModuleIdentity, ModuleStatus, ObservedState, RegistryCredentials,
    RestartPolicy, RuntimeInfo, RuntimeStatus,
};
