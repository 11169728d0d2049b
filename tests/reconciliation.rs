//! End-to-end reconciliation cycles against an in-memory device.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use edge_reconciler::command::RuntimeClient;
use edge_reconciler::module::{ModuleIdentity, ObservedState, RegistryCredentials};
use edge_reconciler::{
    Agent, BackoffConfig, ConfigSource, EntityStore, Environment, HealthRestartPlanner,
    LocalCommandFactory, MemoryEntityStore, Module, ModuleSet, ModuleState, ModuleStatus,
    PlanRunner, Reporter, RestartPolicy, RestartPolicyManager, Result, RuntimeStatus,
};

/// A device whose runtime applies commands to an in-memory module table.
#[derive(Default)]
struct FakeDevice {
    modules: Mutex<BTreeMap<String, (Module, ObservedState)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeDevice {
    fn record(&self, call: String) {
        self.calls.lock().expect("calls lock").push(call);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    fn set_runtime_status(&self, name: &str, status: RuntimeStatus, exit_code: Option<i64>) {
        let mut modules = self.modules.lock().expect("modules lock");
        if let Some((_, observed)) = modules.get_mut(name) {
            observed.runtime_status = status;
            observed.exit_code = exit_code;
        }
    }

    fn runtime_status(&self, name: &str) -> Option<RuntimeStatus> {
        self.modules
            .lock()
            .expect("modules lock")
            .get(name)
            .map(|(_, o)| o.runtime_status)
    }

    fn running(&self) -> ObservedState {
        ObservedState {
            runtime_status: RuntimeStatus::Running,
            started_at: Some(Utc::now()),
            ..ObservedState::default()
        }
    }
}

#[async_trait]
impl RuntimeClient for FakeDevice {
    async fn pull(
        &self,
        image: &str,
        _credentials: Option<&RegistryCredentials>,
        _token: &CancellationToken,
    ) -> Result<()> {
        self.record(format!("pull {image}"));
        Ok(())
    }

    async fn create(
        &self,
        module: &Module,
        _identity: Option<&ModuleIdentity>,
        _token: &CancellationToken,
    ) -> Result<()> {
        self.record(format!("create {}", module.name()));
        let created = ObservedState {
            runtime_status: RuntimeStatus::Stopped,
            ..ObservedState::default()
        };
        self.modules
            .lock()
            .expect("modules lock")
            .insert(module.name().to_string(), (module.clone(), created));
        Ok(())
    }

    async fn start(&self, name: &str, _token: &CancellationToken) -> Result<()> {
        self.record(format!("start {name}"));
        let running = self.running();
        if let Some((_, observed)) = self.modules.lock().expect("modules lock").get_mut(name) {
            *observed = running;
        }
        Ok(())
    }

    async fn stop(&self, name: &str, _token: &CancellationToken) -> Result<()> {
        self.record(format!("stop {name}"));
        self.set_runtime_status(name, RuntimeStatus::Stopped, Some(0));
        Ok(())
    }

    async fn remove(&self, name: &str, _token: &CancellationToken) -> Result<()> {
        self.record(format!("remove {name}"));
        self.modules.lock().expect("modules lock").remove(name);
        Ok(())
    }

    async fn restart(&self, name: &str, token: &CancellationToken) -> Result<()> {
        self.record(format!("restart {name}"));
        self.start(name, token).await
    }

    async fn set_status(
        &self,
        name: &str,
        status: ModuleStatus,
        _token: &CancellationToken,
    ) -> Result<()> {
        self.record(format!("status {name} {status}"));
        let mut modules = self.modules.lock().expect("modules lock");
        if let Some((module, _)) = modules.get_mut(name) {
            *module = module.clone().with_status(status);
        }
        Ok(())
    }
}

#[async_trait]
impl Environment for FakeDevice {
    async fn get_modules(&self, _token: &CancellationToken) -> Result<ModuleSet> {
        let modules = self.modules.lock().expect("modules lock").clone();
        Ok(ModuleSet::create(
            modules
                .into_values()
                .map(|(module, observed)| module.with_observed(observed)),
        )?)
    }
}

/// Desired state the test can swap between cycles.
struct StaticSource(Mutex<ModuleSet>);

impl StaticSource {
    fn new(modules: Vec<Module>) -> Self {
        Self(Mutex::new(
            ModuleSet::create(modules).expect("valid desired set"),
        ))
    }

    fn replace(&self, modules: Vec<Module>) {
        *self.0.lock().expect("source lock") =
            ModuleSet::create(modules).expect("valid desired set");
    }
}

#[async_trait]
impl ConfigSource for StaticSource {
    async fn get_module_set(&self) -> Result<ModuleSet> {
        Ok(self.0.lock().expect("source lock").clone())
    }
}

#[derive(Default)]
struct CountingReporter {
    reports: Mutex<Vec<usize>>,
}

#[async_trait]
impl Reporter for CountingReporter {
    async fn report(&self, current: &ModuleSet) -> Result<()> {
        self.reports.lock().expect("reports lock").push(current.len());
        Ok(())
    }
}

struct Harness {
    device: Arc<FakeDevice>,
    source: Arc<StaticSource>,
    reporter: Arc<CountingReporter>,
    store: Arc<MemoryEntityStore<ModuleState>>,
    agent: Agent,
}

fn harness(desired: Vec<Module>, max_restarts: u32, cool_off: Duration) -> Harness {
    let device = Arc::new(FakeDevice::default());
    let source = Arc::new(StaticSource::new(desired));
    let reporter = Arc::new(CountingReporter::default());
    let store = Arc::new(MemoryEntityStore::<ModuleState>::new());
    let backoff = BackoffConfig::new(cool_off, 3);

    let planner = HealthRestartPlanner::new(
        LocalCommandFactory::new(device.clone()),
        RestartPolicyManager::new(max_restarts, backoff, Duration::from_secs(600)),
        store.clone(),
    );
    let agent = Agent::new(
        source.clone(),
        device.clone(),
        Arc::new(planner),
        PlanRunner::new(2, BackoffConfig::new(Duration::from_millis(1), 1)),
        reporter.clone(),
    );

    Harness {
        device,
        source,
        reporter,
        store,
        agent,
    }
}

fn module(name: &str, image: &str) -> Module {
    Module::new(name, "1.0", "docker", json!({"image": image}))
}

async fn restart_count(store: &MemoryEntityStore<ModuleState>, name: &str) -> u32 {
    store
        .get(name)
        .await
        .expect("store read")
        .map_or(0, |s| s.restart_count())
}

#[tokio::test]
async fn converges_then_stays_idle() {
    let h = harness(
        vec![
            module("sensor", "sensor:1"),
            module("uploader", "uploader:1").with_status(ModuleStatus::Stopped),
        ],
        3,
        Duration::from_secs(10),
    );
    let token = CancellationToken::new();

    let first = assert_ok!(h.agent.reconcile(&token).await);
    assert!(first.is_success());
    assert_eq!(
        h.device.calls(),
        vec![
            "pull sensor:1",
            "create sensor",
            "start sensor",
            "pull uploader:1",
            "create uploader",
        ]
    );

    let second = assert_ok!(h.agent.reconcile(&token).await);
    assert!(second.outcomes.is_empty());
    assert_eq!(h.device.calls().len(), 5);
    assert_eq!(*h.reporter.reports.lock().expect("reports lock"), vec![2, 2]);
}

#[tokio::test]
async fn image_change_removes_before_creating() {
    let h = harness(vec![module("sensor", "sensor:1")], 3, Duration::from_secs(10));
    let token = CancellationToken::new();
    assert_ok!(h.agent.reconcile(&token).await);

    h.source.replace(vec![module("sensor", "sensor:2")]);
    let result = assert_ok!(h.agent.reconcile(&token).await);

    assert!(result.is_success());
    assert_eq!(
        h.device.calls()[3..],
        ["remove sensor", "pull sensor:2", "create sensor", "start sensor"]
    );
}

#[tokio::test]
async fn crashed_module_restarts_then_waits_out_backoff() {
    let h = harness(
        vec![module("sensor", "sensor:1").with_restart_policy(RestartPolicy::OnFailure)],
        3,
        Duration::from_secs(60),
    );
    let token = CancellationToken::new();
    assert_ok!(h.agent.reconcile(&token).await);

    h.device
        .set_runtime_status("sensor", RuntimeStatus::Failed, Some(137));
    assert_ok!(h.agent.reconcile(&token).await);
    assert_eq!(h.device.runtime_status("sensor"), Some(RuntimeStatus::Running));
    assert_eq!(restart_count(&h.store, "sensor").await, 1);

    h.device
        .set_runtime_status("sensor", RuntimeStatus::Failed, Some(137));
    let result = assert_ok!(h.agent.reconcile(&token).await);
    assert!(result.outcomes.is_empty());
    assert_eq!(h.device.runtime_status("sensor"), Some(RuntimeStatus::Failed));
    assert_eq!(restart_count(&h.store, "sensor").await, 1);
}

#[tokio::test]
async fn clean_exit_is_not_restarted_on_failure_policy() {
    let h = harness(
        vec![module("batch", "batch:1").with_restart_policy(RestartPolicy::OnFailure)],
        3,
        Duration::from_millis(1),
    );
    let token = CancellationToken::new();
    assert_ok!(h.agent.reconcile(&token).await);

    h.device
        .set_runtime_status("batch", RuntimeStatus::Stopped, Some(0));
    let result = assert_ok!(h.agent.reconcile(&token).await);

    assert!(result.outcomes.is_empty());
    assert_eq!(restart_count(&h.store, "batch").await, 0);
}

#[tokio::test]
async fn gives_up_after_max_restarts() {
    let h = harness(vec![module("sensor", "sensor:1")], 1, Duration::from_millis(1));
    let token = CancellationToken::new();
    assert_ok!(h.agent.reconcile(&token).await);

    h.device
        .set_runtime_status("sensor", RuntimeStatus::Failed, Some(1));
    assert_ok!(h.agent.reconcile(&token).await);
    assert_eq!(restart_count(&h.store, "sensor").await, 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.device
        .set_runtime_status("sensor", RuntimeStatus::Failed, Some(1));
    let result = assert_ok!(h.agent.reconcile(&token).await);

    assert!(result.outcomes.is_empty());
    assert_eq!(h.device.runtime_status("sensor"), Some(RuntimeStatus::Failed));
}

#[tokio::test]
async fn shutdown_stops_every_module() {
    let h = harness(
        vec![module("a", "a:1"), module("b", "b:1")],
        3,
        Duration::from_secs(10),
    );
    let token = CancellationToken::new();
    assert_ok!(h.agent.reconcile(&token).await);

    let result = assert_ok!(h.agent.shutdown(&token).await);

    assert_eq!(result.succeeded(), 2);
    assert_eq!(h.device.runtime_status("a"), Some(RuntimeStatus::Stopped));
    assert_eq!(h.device.runtime_status("b"), Some(RuntimeStatus::Stopped));
}
