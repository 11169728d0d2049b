// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![warn(warnings)]                    // All warnings are surfaced
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Edge Reconciler
//!
//! A reconciliation engine that keeps the modules of an edge device in line
//! with their declared desired state.
//!
//! ## Overview
//!
//! Each reconciliation cycle:
//!
//! - Fetches the desired module set from a [`ConfigSource`]
//! - Fetches the current module set, with observed runtime status, from an [`Environment`]
//! - Plans the commands that close the gap, honouring per-module restart policies
//!   and exponential backoff so crash-looping modules do not thrash
//! - Runs the plan one command at a time, isolating failures per command
//! - Reports the observed state afterwards through a [`Reporter`]
//!
//! When a cycle runs is up to the caller.
//!
//! ## Modules
//!
//! - [`module`]: Module values, module sets and their diff
//! - [`restart`]: Restart decisions and backoff
//! - [`state`]: Per-module restart bookkeeping (in-memory and file stores)
//! - [`command`]: Commands and the factories mapping intents onto a runtime target
//! - [`planner`]: Planning and plan execution
//! - [`agent`]: The reconciliation cycle
//! - [`config`]: Engine settings and the deployment manifest
//! - [`logging`]: Tracing subscriber setup
//!
//! ## Example manifest
//!
//! ```yaml
//! runtime:
//!   kind: docker
//!   registry_credentials:
//!     - address: registry.example.com
//!       username: edge
//!       password: secret
//!
//! modules:
//!   - name: sensor
//!     version: "1.0"
//!     type: docker
//!     restart_policy: onFailure
//!     config:
//!       image: registry.example.com/sensor:1.0
//!   - name: uploader
//!     version: "2.3"
//!     type: docker
//!     status: stopped
//!     config:
//!       image: registry.example.com/uploader:2.3
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod agent;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod module;
pub mod planner;
pub mod restart;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use agent::{Agent, ConfigSource, DesiredState, Environment, Reporter};
pub use command::{
    ClusterClient, ClusterCommandFactory, Command, CommandFactory, CommandKind, CommandRef,
    GroupCommand, LocalCommandFactory, RuntimeClient,
};
pub use config::{
    ConfigHasher, DeploymentManifest, EngineSettings, FileConfigSource, SettingsParser,
};
pub use error::{EdgeError, Result};
pub use logging::init_logging;
pub use module::{Diff, Module, ModuleSet, ModuleStatus, RestartPolicy, RuntimeStatus};
pub use planner::{
    CycleResult, HealthRestartPlanner, ModuleOutcome, Plan, PlanContext, PlanRunner, Planner,
};
pub use restart::{BackoffConfig, RestartDecision, RestartPolicyManager};
pub use state::{
    EntityStore, FileEntityStore, MemoryEntityStore, ModuleState, open_module_state_store,
};
