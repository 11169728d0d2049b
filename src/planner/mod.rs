//! Planning and plan execution.
//!
//! A [`Planner`] compares the desired module set with the current one and
//! produces a [`Plan`]; the [`PlanRunner`] executes it.

mod health_restart;
mod plan;
mod runner;

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::module::{ModuleIdentity, ModuleSet, RuntimeInfo};

pub use health_restart::HealthRestartPlanner;
pub use plan::Plan;
pub use runner::{CycleResult, ModuleOutcome, OutcomeStatus, PlanRunner};

/// Inputs a planner needs besides the two module sets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanContext {
    /// Runtime-level configuration (registry credentials and the like).
    pub runtime_info: RuntimeInfo,
    /// Provisioned identities by module name.
    pub identities: BTreeMap<String, ModuleIdentity>,
}

/// Produces plans.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plans the commands that move `current` towards `desired`.
    ///
    /// Returns [`Plan::EMPTY`] when nothing needs to change.
    async fn plan(
        &self,
        desired: &ModuleSet,
        current: &ModuleSet,
        context: &PlanContext,
    ) -> Result<Plan>;

    /// Plans stopping every module in `current`.
    async fn create_shutdown_plan(&self, current: &ModuleSet) -> Result<Plan>;
}
