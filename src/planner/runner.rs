//! Plan runner.
//!
//! Executes a plan's commands strictly in order. A failing command is retried
//! with backoff; once its attempts are used up the failure is recorded and the
//! runner moves on. Cancellation stops the run before the next command.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::command::{CommandKind, CommandRef};
use crate::config::RunnerSettings;
use crate::restart::BackoffConfig;

use super::plan::Plan;

/// Outcome of one command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The command succeeded.
    Succeeded {
        /// Attempts it took.
        attempts: u32,
    },
    /// The command failed on every attempt.
    Failed {
        /// Last error.
        error: String,
        /// Attempts made.
        attempts: u32,
    },
}

/// Result of executing one command of a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleOutcome {
    /// Module the command is bound to.
    pub module: String,
    /// Command kind.
    pub kind: CommandKind,
    /// Command description.
    pub command: String,
    /// How it went.
    pub status: OutcomeStatus,
}

/// Result of running a plan.
#[derive(Debug, Clone, Serialize)]
pub struct CycleResult {
    /// Per-command outcomes in execution order.
    pub outcomes: Vec<ModuleOutcome>,
    /// Whether the run stopped on cancellation.
    pub cancelled: bool,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl ModuleOutcome {
    /// Returns true if the command succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Succeeded { .. })
    }
}

impl CycleResult {
    /// Result of a run that executed nothing.
    #[must_use]
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            outcomes: Vec::new(),
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// Returns true if nothing failed and the run was not cancelled.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.cancelled && self.outcomes.iter().all(ModuleOutcome::is_success)
    }

    /// Number of commands that succeeded.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of commands that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    /// Per-module success: a module succeeded if all its commands did.
    #[must_use]
    pub fn module_statuses(&self) -> BTreeMap<&str, bool> {
        let mut statuses: BTreeMap<&str, bool> = BTreeMap::new();
        for outcome in &self.outcomes {
            let ok = statuses.entry(outcome.module.as_str()).or_insert(true);
            *ok &= outcome.is_success();
        }
        statuses
    }

    /// Outcomes for one module.
    pub fn outcomes_for<'a>(&'a self, module: &'a str) -> impl Iterator<Item = &'a ModuleOutcome> {
        self.outcomes.iter().filter(move |o| o.module == module)
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration(&self) -> Duration {
        (self.finished_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Executes plans command by command.
#[derive(Debug, Clone, Copy)]
pub struct PlanRunner {
    max_attempts: u32,
    backoff: BackoffConfig,
}

impl PlanRunner {
    /// Creates a runner.
    ///
    /// `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: BackoffConfig) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Creates a runner from engine settings.
    #[must_use]
    pub fn from_settings(settings: &RunnerSettings, backoff: BackoffConfig) -> Self {
        Self::new(settings.max_attempts, backoff)
    }

    /// Maximum attempts per command.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Runs `plan`, stopping early if `token` is cancelled.
    pub async fn run(&self, plan: &Plan, token: &CancellationToken) -> CycleResult {
        let started_at = Utc::now();
        let mut outcomes = Vec::with_capacity(plan.len());
        let mut cancelled = false;

        if !plan.is_empty() {
            info!("Executing plan with {} command(s)", plan.len());
        }

        for (idx, cmd) in plan.commands().iter().enumerate() {
            if token.is_cancelled() {
                warn!(
                    "Cancelled before command {idx}; {} command(s) not run",
                    plan.len() - idx
                );
                cancelled = true;
                break;
            }

            let (status, interrupted) = self.run_command(cmd, token).await;
            outcomes.push(ModuleOutcome {
                module: cmd.module().to_string(),
                kind: cmd.kind(),
                command: cmd.show(),
                status,
            });
            if interrupted {
                cancelled = true;
                break;
            }
        }

        let result = CycleResult {
            outcomes,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };
        if !plan.is_empty() {
            info!("{result}");
        }
        result
    }

    /// Runs one command with retries. The flag reports an interruption by cancellation.
    async fn run_command(&self, cmd: &CommandRef, token: &CancellationToken) -> (OutcomeStatus, bool) {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match cmd.execute(token).await {
                Ok(()) => return (OutcomeStatus::Succeeded { attempts: attempt }, false),
                Err(e) => e,
            };

            if err.is_cancelled() {
                warn!("'{}' cancelled", cmd.show());
                return (failed(&err, attempt), true);
            }
            if !err.is_retryable() || attempt >= self.max_attempts {
                error!(
                    "'{}' failed after {attempt} attempt(s): {err}",
                    cmd.show()
                );
                return (failed(&err, attempt), false);
            }

            let delay = self.backoff.window(attempt - 1);
            warn!(
                "'{}' failed (attempt {attempt}/{}), retrying in {}ms: {err}",
                cmd.show(),
                self.max_attempts,
                delay.as_millis()
            );
            tokio::select! {
                () = token.cancelled() => return (failed(&err, attempt), true),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for PlanRunner {
    fn default() -> Self {
        Self::from_settings(&RunnerSettings::default(), BackoffConfig::default())
    }
}

fn failed(err: &crate::error::EdgeError, attempts: u32) -> OutcomeStatus {
    OutcomeStatus::Failed {
        error: err.to_string(),
        attempts,
    }
}

impl std::fmt::Display for CycleResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cycle finished in {}ms: {} succeeded, {} failed",
            self.duration().as_millis(),
            self.succeeded(),
            self.failed()
        )?;
        if self.cancelled {
            write!(f, " (cancelled)")?;
        }
        Ok(())
    }
}
