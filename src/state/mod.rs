//! Module-state storage.
//!
//! This module provides the keyed store holding per-module restart
//! bookkeeping, with an in-memory backend and a local file backend.

mod local;
mod memory;
mod store;
mod types;

pub use local::{FileEntityStore, STATE_FILE};
pub use memory::MemoryEntityStore;
pub use store::{EntityStore, Mutator, open_module_state_store};
pub use types::ModuleState;
