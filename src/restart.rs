//! Restart policy evaluation and backoff.
//!
//! The [`RestartPolicyManager`] turns a module's restart policy, its desired
//! and observed status, and its persisted [`ModuleState`] into a
//! [`RestartDecision`]. Crash-looping modules are held back by an
//! exponentially growing cool-off window and given up on once they reach the
//! maximum restart count.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RestartSettings;
use crate::module::{Module, ModuleStatus, RestartPolicy, RuntimeStatus};
use crate::state::{EntityStore, ModuleState};

/// Exponential backoff parameters shared by restart decisions and command retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Base cool-off duration.
    pub cool_off_unit: Duration,
    /// Largest exponent applied to the base duration.
    pub cap_exponent: u32,
}

/// Outcome of evaluating a module's restart policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart the module now.
    Restart,
    /// Stop a module that runs although it is desired stopped.
    Stop,
    /// The module is eligible but still inside its backoff window.
    Wait,
    /// The module reached the maximum restart count and stays down.
    GiveUp,
    /// Nothing to do.
    NoAction,
}

/// Decides restart and backoff actions.
#[derive(Debug, Clone)]
pub struct RestartPolicyManager {
    /// Restart count at which restarts stop.
    max_restart_count: u32,
    /// Backoff parameters.
    backoff: BackoffConfig,
    /// Healthy run time after which the restart count is reset.
    intensive_care_time: Duration,
}

impl BackoffConfig {
    /// Creates a backoff configuration.
    #[must_use]
    pub const fn new(cool_off_unit: Duration, cap_exponent: u32) -> Self {
        Self {
            cool_off_unit,
            cap_exponent,
        }
    }

    /// Returns `cool_off_unit * 2^min(exponent, cap_exponent)`.
    #[must_use]
    pub fn window(&self, exponent: u32) -> Duration {
        let factor = 1u32
            .checked_shl(exponent.min(self.cap_exponent))
            .unwrap_or(u32::MAX);
        self.cool_off_unit.saturating_mul(factor)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10), 5)
    }
}

impl RestartPolicyManager {
    /// Creates a restart policy manager.
    #[must_use]
    pub const fn new(
        max_restart_count: u32,
        backoff: BackoffConfig,
        intensive_care_time: Duration,
    ) -> Self {
        Self {
            max_restart_count,
            backoff,
            intensive_care_time,
        }
    }

    /// Creates a manager from engine settings.
    #[must_use]
    pub const fn from_settings(settings: &RestartSettings) -> Self {
        Self::new(
            settings.max_restart_count,
            settings.backoff(),
            Duration::from_secs(settings.intensive_care_secs),
        )
    }

    /// Backoff parameters in use.
    #[must_use]
    pub const fn backoff(&self) -> BackoffConfig {
        self.backoff
    }

    /// Restart count at which restarts stop.
    #[must_use]
    pub const fn max_restart_count(&self) -> u32 {
        self.max_restart_count
    }

    /// Decides what to do with a module given its persisted state.
    #[must_use]
    pub fn compute_decision(
        &self,
        module: &Module,
        state: &ModuleState,
        now: DateTime<Utc>,
    ) -> RestartDecision {
        let Some(observed) = module.observed() else {
            return RestartDecision::NoAction;
        };

        if module.status() == ModuleStatus::Stopped
            && observed.runtime_status == RuntimeStatus::Running
        {
            return RestartDecision::Stop;
        }

        if !Self::is_eligible(module) {
            return RestartDecision::NoAction;
        }

        if state.restart_count() >= self.max_restart_count {
            debug!(
                "Module {} reached {} restarts, giving up",
                module.name(),
                state.restart_count()
            );
            return RestartDecision::GiveUp;
        }

        let window = self.backoff.window(state.restart_count());
        let elapsed = (now - state.last_restart_time_utc())
            .to_std()
            .unwrap_or(Duration::ZERO);

        if elapsed < window {
            debug!(
                "Module {} in backoff: {}s of {}s elapsed",
                module.name(),
                elapsed.as_secs(),
                window.as_secs()
            );
            return RestartDecision::Wait;
        }

        RestartDecision::Restart
    }

    /// Decides what to do with a module, reading its state from the store.
    ///
    /// An unreachable store is treated as a module that was never restarted.
    pub async fn decide(
        &self,
        module: &Module,
        store: &dyn EntityStore<ModuleState>,
        now: DateTime<Utc>,
    ) -> RestartDecision {
        let state = self.load_state(module.name(), store).await;
        self.compute_decision(module, &state, now)
    }

    /// Loads a module's state, falling back to the never-restarted state.
    pub async fn load_state(
        &self,
        name: &str,
        store: &dyn EntityStore<ModuleState>,
    ) -> ModuleState {
        match store.get(name).await {
            Ok(state) => state.unwrap_or_default(),
            Err(e) => {
                warn!("Module state for {name} unavailable, assuming no prior restarts: {e}");
                ModuleState::never_restarted()
            }
        }
    }

    /// Returns true if the module has been running longer than the intensive-care period.
    #[must_use]
    pub fn is_past_intensive_care(&self, module: &Module, now: DateTime<Utc>) -> bool {
        let Some(observed) = module.observed() else {
            return false;
        };
        if observed.runtime_status != RuntimeStatus::Running {
            return false;
        }
        observed.started_at.is_some_and(|started| {
            (now - started)
                .to_std()
                .is_ok_and(|running_for| running_for >= self.intensive_care_time)
        })
    }

    /// Returns true if the module's policy allows restarting it in its observed state.
    fn is_eligible(module: &Module) -> bool {
        let Some(observed) = module.observed() else {
            return false;
        };
        if module.status() != ModuleStatus::Running {
            return false;
        }

        let failed = match observed.runtime_status {
            RuntimeStatus::Failed | RuntimeStatus::Backoff => true,
            RuntimeStatus::Stopped => observed.exit_code.is_some_and(|code| code != 0),
            RuntimeStatus::Running | RuntimeStatus::Unknown => false,
        };

        match module.restart_policy() {
            RestartPolicy::Never => false,
            RestartPolicy::OnFailure => failed,
            RestartPolicy::OnUnhealthy => {
                failed || observed.runtime_status == RuntimeStatus::Unknown
            }
            RestartPolicy::Always => observed.runtime_status != RuntimeStatus::Running,
        }
    }
}

impl Default for RestartPolicyManager {
    fn default() -> Self {
        Self::new(5, BackoffConfig::default(), Duration::from_secs(600))
    }
}

impl std::fmt::Display for RestartDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Restart => "restart",
            Self::Stop => "stop",
            Self::Wait => "wait",
            Self::GiveUp => "give up",
            Self::NoAction => "no action",
        };
        write!(f, "{s}")
    }
}
