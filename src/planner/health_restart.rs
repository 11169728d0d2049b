//! Health-aware restart planner.
//!
//! Turns a desired and a current module set into a plan: removals first, then
//! in-place updates, then creations, then restart-policy actions for modules
//! the diff left untouched. Every group is emitted in ascending name order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::command::{
    CommandFactory, CommandKind, CommandRef, GroupCommand, ModuleStateStore,
    RecordRestartCommand, ResetRestartStateCommand,
};
use crate::config::ConfigHasher;
use crate::error::{PlanError, Result};
use crate::module::{Module, ModuleSet, normalize_identity};
use crate::restart::{RestartDecision, RestartPolicyManager};

use super::plan::Plan;
use super::{PlanContext, Planner};

/// Planner combining set differencing with restart-policy decisions.
pub struct HealthRestartPlanner<F> {
    factory: F,
    restart_manager: RestartPolicyManager,
    store: ModuleStateStore,
}

impl<F: CommandFactory> HealthRestartPlanner<F> {
    /// Creates a planner issuing commands through `factory`.
    #[must_use]
    pub fn new(factory: F, restart_manager: RestartPolicyManager, store: ModuleStateStore) -> Self {
        Self {
            factory,
            restart_manager,
            store,
        }
    }

    /// The command factory in use.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Plans against an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns a [`PlanError`] if the desired set fails validation.
    pub async fn plan_at(
        &self,
        desired: &ModuleSet,
        current: &ModuleSet,
        context: &PlanContext,
        now: DateTime<Utc>,
    ) -> Result<Plan> {
        self.validate(desired, context)?;

        let diff = desired.diff(current);
        debug!("Diff against current modules: {diff}");

        let mut removals: Vec<&Module> = Vec::new();
        let mut updates: Vec<(&Module, &Module)> = Vec::new();
        let mut creations: Vec<&Module> = diff.created.iter().collect();

        for name in &diff.removed {
            if let Some(module) = current.get(name) {
                removals.push(module);
            }
        }

        for module in &diff.updated {
            let Some(existing) = current.get(module.name()) else {
                creations.push(module);
                continue;
            };
            if existing.differs_only_in_status(module) {
                updates.push((existing, module));
            } else {
                removals.push(existing);
                creations.push(module);
            }
        }

        removals.sort_by(|a, b| a.name().cmp(b.name()));
        creations.sort_by(|a, b| a.name().cmp(b.name()));

        let mut commands: Vec<CommandRef> = Vec::new();
        commands.extend(removals.iter().map(|m| self.factory.remove(m)));
        commands.extend(
            updates
                .iter()
                .map(|(existing, module)| self.factory.update(existing, module)),
        );
        let hasher = ConfigHasher::new();
        commands.extend(creations.iter().map(|m| {
            debug!("Creating {} at revision {}", m.name(), hasher.short_hash(m));
            self.factory
                .create(m, &context.runtime_info, context.identities.get(m.name()))
        }));

        for module in current.iter() {
            if diff.touches(module.name()) || !desired.contains(module.name()) {
                continue;
            }
            if let Some(cmd) = self.plan_restart_policy(module, now).await {
                commands.push(cmd);
            }
        }

        let plan = Plan::new(commands);
        if plan.is_empty() {
            debug!("No changes required");
        } else {
            info!(
                "Planned {} command(s) for {} module(s)",
                plan.len(),
                plan.modules().len()
            );
            for cmd in plan.commands() {
                debug!("  [{}] {}", cmd.kind(), cmd.show());
            }
        }
        Ok(plan)
    }

    /// Rejects desired sets that cannot be planned.
    fn validate(&self, desired: &ModuleSet, context: &PlanContext) -> Result<()> {
        let mut seen: HashMap<String, &str> = HashMap::with_capacity(desired.len());
        for module in desired.iter() {
            if let Some(first) = seen.insert(module.identity_key(), module.name()) {
                return Err(PlanError::InvalidIdentity {
                    first: first.to_string(),
                    second: module.name().to_string(),
                }
                .into());
            }
            self.factory.validate(module)?;
        }

        let mut identity_keys: HashMap<String, &str> = HashMap::new();
        for name in context.identities.keys() {
            if let Some(first) = identity_keys.insert(normalize_identity(name), name.as_str())
            {
                return Err(PlanError::InvalidIdentity {
                    first: first.to_string(),
                    second: name.clone(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Maps the restart decision for an unchanged module onto a command.
    async fn plan_restart_policy(&self, module: &Module, now: DateTime<Utc>) -> Option<CommandRef> {
        let state = self
            .restart_manager
            .load_state(module.name(), self.store.as_ref())
            .await;

        match self.restart_manager.compute_decision(module, &state, now) {
            RestartDecision::Restart => {
                debug!(
                    "Restarting {} (restart {} of {})",
                    module.name(),
                    state.restart_count() + 1,
                    self.restart_manager.max_restart_count()
                );
                let steps: Vec<CommandRef> = vec![
                    Arc::new(RecordRestartCommand::new(
                        module.name(),
                        Arc::clone(&self.store),
                    )),
                    self.factory.restart(module),
                ];
                Some(Arc::new(GroupCommand::new(
                    CommandKind::Restart,
                    module.name(),
                    steps,
                )))
            }
            RestartDecision::Stop => Some(self.factory.stop(module)),
            RestartDecision::GiveUp => {
                warn!(
                    "Giving up on {} after {} restart(s)",
                    module.name(),
                    state.restart_count()
                );
                None
            }
            RestartDecision::Wait => None,
            RestartDecision::NoAction => (state.restart_count() > 0
                && self.restart_manager.is_past_intensive_care(module, now))
            .then(|| {
                debug!("{} left intensive care, clearing restart count", module.name());
                Arc::new(ResetRestartStateCommand::new(
                    module.name(),
                    Arc::clone(&self.store),
                )) as CommandRef
            }),
        }
    }
}

impl<F: std::fmt::Debug> std::fmt::Debug for HealthRestartPlanner<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthRestartPlanner")
            .field("factory", &self.factory)
            .field("restart_manager", &self.restart_manager)
            .field("store", &self.store.backend_type())
            .finish()
    }
}

#[async_trait]
impl<F: CommandFactory> Planner for HealthRestartPlanner<F> {
    async fn plan(
        &self,
        desired: &ModuleSet,
        current: &ModuleSet,
        context: &PlanContext,
    ) -> Result<Plan> {
        self.plan_at(desired, current, context, Utc::now()).await
    }

    async fn create_shutdown_plan(&self, current: &ModuleSet) -> Result<Plan> {
        let commands: Vec<CommandRef> = current.iter().map(|m| self.factory.stop(m)).collect();
        info!("Shutdown plan stops {} module(s)", commands.len());
        Ok(Plan::new(commands))
    }
}
