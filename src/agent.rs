//! Reconciliation agent.
//!
//! The agent drives one reconciliation cycle at a time: fetch the desired and
//! current module sets, plan, run the plan, then report what the environment
//! looks like afterwards. When cycles run is decided by the caller.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::error::{EdgeError, Result, SourceError};
use crate::module::{ModuleIdentity, ModuleSet, RuntimeInfo};
use crate::planner::{CycleResult, PlanContext, PlanRunner, Planner};

/// Desired modules together with the context they were declared with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DesiredState {
    /// Desired module set.
    pub modules: ModuleSet,
    /// Runtime configuration and identities for planning.
    pub context: PlanContext,
}

/// Source of the desired state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ConfigSource: Send + Sync {
    /// Desired modules, runtime configuration and identities from one read.
    ///
    /// The default composes the individual getters; sources that can change
    /// between calls override it to return a single snapshot.
    async fn get_desired_state(&self) -> Result<DesiredState> {
        Ok(DesiredState {
            modules: self.get_module_set().await?,
            context: PlanContext {
                runtime_info: self.get_runtime_info().await?,
                identities: self.get_identities().await?,
            },
        })
    }

    /// Desired module set.
    async fn get_module_set(&self) -> Result<ModuleSet>;

    /// Runtime-level configuration delivered with the desired state.
    async fn get_runtime_info(&self) -> Result<RuntimeInfo> {
        Ok(RuntimeInfo::default())
    }

    /// Provisioned module identities by module name.
    async fn get_identities(&self) -> Result<BTreeMap<String, ModuleIdentity>> {
        Ok(BTreeMap::new())
    }
}

/// View of the execution environment.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Environment: Send + Sync {
    /// Modules currently deployed, annotated with their observed state.
    async fn get_modules(&self, token: &CancellationToken) -> Result<ModuleSet>;
}

/// Sink for observed state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Reports the observed module set.
    async fn report(&self, current: &ModuleSet) -> Result<()>;
}

/// Drives reconciliation cycles.
pub struct Agent {
    config_source: Arc<dyn ConfigSource>,
    environment: Arc<dyn Environment>,
    planner: Arc<dyn Planner>,
    runner: PlanRunner,
    reporter: Arc<dyn Reporter>,
    cycle_lock: Mutex<()>,
}

impl Agent {
    /// Creates an agent from its collaborators.
    #[must_use]
    pub fn new(
        config_source: Arc<dyn ConfigSource>,
        environment: Arc<dyn Environment>,
        planner: Arc<dyn Planner>,
        runner: PlanRunner,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            config_source,
            environment,
            planner,
            runner,
            reporter,
            cycle_lock: Mutex::new(()),
        }
    }

    /// Runs one reconciliation cycle.
    ///
    /// Concurrent calls are serialized.
    ///
    /// # Errors
    ///
    /// Returns an error if the desired or current state cannot be fetched or
    /// planning fails. Command failures are reported in the [`CycleResult`].
    pub async fn reconcile(&self, token: &CancellationToken) -> Result<CycleResult> {
        let _cycle = self.cycle_lock.lock().await;
        let cycle_id = Uuid::new_v4();

        self.reconcile_cycle(token)
            .instrument(info_span!("reconcile", %cycle_id))
            .await
    }

    /// Stops every deployed module.
    ///
    /// # Errors
    ///
    /// Returns an error if the current state cannot be fetched or the
    /// shutdown plan cannot be built.
    pub async fn shutdown(&self, token: &CancellationToken) -> Result<CycleResult> {
        let _cycle = self.cycle_lock.lock().await;

        async {
            info!("Shutting down deployed modules");
            let current = self.fetch_current(token).await?;
            let plan = self.planner.create_shutdown_plan(&current).await?;
            Ok(self.runner.run(&plan, token).await)
        }
        .instrument(info_span!("shutdown"))
        .await
    }

    async fn reconcile_cycle(&self, token: &CancellationToken) -> Result<CycleResult> {
        let (desired, context) = self.fetch_desired().await?;
        let current = self.fetch_current(token).await?;
        debug!(
            "Desired {} module(s), current {} module(s)",
            desired.len(),
            current.len()
        );

        let plan = match self.planner.plan(&desired, &current, &context).await {
            Ok(plan) => plan,
            Err(e) => {
                error!("Planning failed, nothing executed: {e}");
                return Err(e);
            }
        };

        if plan.is_empty() {
            info!("No changes required");
            self.report(&current).await;
            return Ok(CycleResult::empty());
        }

        let result = self.runner.run(&plan, token).await;

        match self.environment.get_modules(token).await {
            Ok(observed) => self.report(&observed).await,
            Err(e) => warn!("Could not re-read the environment, skipping report: {e}"),
        }

        Ok(result)
    }

    async fn fetch_desired(&self) -> Result<(ModuleSet, PlanContext)> {
        let DesiredState { modules, context } = self
            .config_source
            .get_desired_state()
            .await
            .map_err(as_config_source_error)?;
        Ok((modules, context))
    }

    async fn fetch_current(&self, token: &CancellationToken) -> Result<ModuleSet> {
        self.environment.get_modules(token).await.map_err(|e| match e {
            EdgeError::Source(_) => e,
            other => SourceError::environment(other.to_string()).into(),
        })
    }

    async fn report(&self, observed: &ModuleSet) {
        if let Err(e) = self.reporter.report(observed).await {
            warn!("Reporter failed: {e}");
        }
    }
}

fn as_config_source_error(e: EdgeError) -> EdgeError {
    match e {
        EdgeError::Source(_) | EdgeError::Module(_) => e,
        other => SourceError::config_source(other.to_string()).into(),
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CommandFactory, LocalCommandFactory, RecordingRuntime};
    use crate::module::Module;
    use crate::planner::{MockPlanner, Plan};
    use crate::restart::BackoffConfig;
    use serde_json::json;
    use std::time::Duration;

    fn module(name: &str) -> Module {
        Module::new(name, "1.0", "docker", json!({"image": format!("{name}:1")}))
    }

    fn set(names: &[&str]) -> ModuleSet {
        ModuleSet::create(names.iter().map(|n| module(n))).expect("valid set")
    }

    fn config_source(modules: ModuleSet) -> MockConfigSource {
        let mut source = MockConfigSource::new();
        source.expect_get_desired_state().returning(move || {
            Ok(DesiredState {
                modules: modules.clone(),
                context: PlanContext::default(),
            })
        });
        source.expect_get_module_set().never();
        source.expect_get_runtime_info().never();
        source.expect_get_identities().never();
        source
    }

    fn runner() -> PlanRunner {
        PlanRunner::new(2, BackoffConfig::new(Duration::from_millis(1), 1))
    }

    fn agent(
        source: MockConfigSource,
        env: MockEnvironment,
        planner: MockPlanner,
        reporter: MockReporter,
    ) -> Agent {
        Agent::new(
            Arc::new(source),
            Arc::new(env),
            Arc::new(planner),
            runner(),
            Arc::new(reporter),
        )
    }

    #[tokio::test]
    async fn test_empty_plan_reads_environment_once() {
        let mut env = MockEnvironment::new();
        env.expect_get_modules()
            .times(1)
            .returning(|_| Ok(set(&["a"])));
        let mut planner = MockPlanner::new();
        planner.expect_plan().times(1).returning(|_, _, _| Ok(Plan::EMPTY));
        let mut reporter = MockReporter::new();
        reporter.expect_report().times(1).returning(|_| Ok(()));

        let agent = agent(config_source(set(&["a"])), env, planner, reporter);
        let result = agent
            .reconcile(&CancellationToken::new())
            .await
            .expect("cycle");

        assert!(result.is_success());
        assert!(result.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_non_empty_plan_rereads_environment_before_report() {
        let runtime = Arc::new(RecordingRuntime::default());
        let factory = LocalCommandFactory::new(runtime.clone());
        let restart = factory.restart(&module("a"));

        let mut env = MockEnvironment::new();
        env.expect_get_modules()
            .times(2)
            .returning(|_| Ok(set(&["a"])));
        let mut planner = MockPlanner::new();
        planner
            .expect_plan()
            .times(1)
            .returning(move |_, _, _| Ok(Plan::new(vec![restart.clone()])));
        let mut reporter = MockReporter::new();
        reporter
            .expect_report()
            .withf(|observed| observed.contains("a"))
            .times(1)
            .returning(|_| Ok(()));

        let agent = agent(config_source(set(&["a"])), env, planner, reporter);
        let result = agent
            .reconcile(&CancellationToken::new())
            .await
            .expect("cycle");

        assert_eq!(result.succeeded(), 1);
        assert_eq!(runtime.calls(), vec!["restart a"]);
    }

    #[tokio::test]
    async fn test_config_source_failure_aborts_cycle() {
        let mut source = MockConfigSource::new();
        source
            .expect_get_desired_state()
            .returning(|| Err(EdgeError::internal("control plane offline")));
        let mut env = MockEnvironment::new();
        env.expect_get_modules().never();
        let mut planner = MockPlanner::new();
        planner.expect_plan().never();
        let mut reporter = MockReporter::new();
        reporter.expect_report().never();

        let agent = agent(source, env, planner, reporter);
        let err = agent
            .reconcile(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EdgeError::Source(SourceError::ConfigSourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_environment_failure_aborts_cycle() {
        let mut env = MockEnvironment::new();
        env.expect_get_modules()
            .returning(|_| Err(EdgeError::internal("runtime socket closed")));
        let mut planner = MockPlanner::new();
        planner.expect_plan().never();
        let mut reporter = MockReporter::new();
        reporter.expect_report().never();

        let agent = agent(config_source(set(&["a"])), env, planner, reporter);
        let err = agent
            .reconcile(&CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            EdgeError::Source(SourceError::EnvironmentUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_reporter_failure_does_not_fail_cycle() {
        let mut env = MockEnvironment::new();
        env.expect_get_modules().returning(|_| Ok(set(&[])));
        let mut planner = MockPlanner::new();
        planner.expect_plan().returning(|_, _, _| Ok(Plan::EMPTY));
        let mut reporter = MockReporter::new();
        reporter
            .expect_report()
            .returning(|_| Err(EdgeError::internal("upstream unavailable")));

        let agent = agent(config_source(set(&[])), env, planner, reporter);

        assert!(agent.reconcile(&CancellationToken::new()).await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_runs_shutdown_plan() {
        let runtime = Arc::new(RecordingRuntime::default());
        let factory = LocalCommandFactory::new(runtime.clone());
        let stop = factory.stop(&module("a"));

        let mut env = MockEnvironment::new();
        env.expect_get_modules()
            .times(1)
            .returning(|_| Ok(set(&["a"])));
        let mut planner = MockPlanner::new();
        planner
            .expect_create_shutdown_plan()
            .times(1)
            .returning(move |_| Ok(Plan::new(vec![stop.clone()])));

        let agent = agent(
            MockConfigSource::new(),
            env,
            planner,
            MockReporter::new(),
        );
        let result = agent
            .shutdown(&CancellationToken::new())
            .await
            .expect("shutdown");

        assert!(result.is_success());
        assert_eq!(runtime.calls(), vec!["stop a"]);
    }
}
