//! Persisted per-module restart bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Restart bookkeeping for one module.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleState {
    /// Number of restarts performed since the last reset.
    restart_count: u32,
    /// When the module was last restarted.
    last_restart_time_utc: DateTime<Utc>,
}

impl ModuleState {
    /// Creates a module state.
    #[must_use]
    pub const fn new(restart_count: u32, last_restart_time_utc: DateTime<Utc>) -> Self {
        Self {
            restart_count,
            last_restart_time_utc,
        }
    }

    /// State of a module that was never restarted.
    #[must_use]
    pub const fn never_restarted() -> Self {
        Self::new(0, DateTime::<Utc>::UNIX_EPOCH)
    }

    /// State recorded on the first restart of a module.
    #[must_use]
    pub const fn first_restart(now: DateTime<Utc>) -> Self {
        Self::new(1, now)
    }

    /// Returns the state after one more restart at `now`.
    #[must_use]
    pub const fn record_restart(&self, now: DateTime<Utc>) -> Self {
        Self::new(self.restart_count.saturating_add(1), now)
    }

    /// Returns the state with the restart count cleared.
    #[must_use]
    pub const fn reset(&self) -> Self {
        Self::new(0, self.last_restart_time_utc)
    }

    /// Number of restarts since the last reset.
    #[must_use]
    pub const fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Time of the last restart.
    #[must_use]
    pub const fn last_restart_time_utc(&self) -> DateTime<Utc> {
        self.last_restart_time_utc
    }
}

impl Default for ModuleState {
    fn default() -> Self {
        Self::never_restarted()
    }
}

impl std::fmt::Display for ModuleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} restarts (last at {})",
            self.restart_count,
            self.last_restart_time_utc.to_rfc3339()
        )
    }
}
