//! Command factory trait.
//!
//! A factory maps module lifecycle intents onto commands for one runtime
//! target. The planner only ever talks to this trait, so the same planning
//! algorithm drives a single host or a cluster.

use crate::error::PlanError;
use crate::module::{Module, ModuleIdentity, RuntimeInfo};

use super::types::CommandRef;

/// Builds commands for one runtime target.
pub trait CommandFactory: Send + Sync + std::fmt::Debug {
    /// Name of the runtime target (e.g. `local`).
    fn target(&self) -> &'static str;

    /// Checks that `module` can be mapped to commands by this factory.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::InvalidModule`] when the module type is unsupported
    /// or its configuration lacks what the target needs.
    fn validate(&self, module: &Module) -> Result<(), PlanError>;

    /// Command bringing a new module to its desired status.
    fn create(
        &self,
        module: &Module,
        runtime_info: &RuntimeInfo,
        identity: Option<&ModuleIdentity>,
    ) -> CommandRef;

    /// Command applying a status-only change to an existing module.
    fn update(&self, current: &Module, desired: &Module) -> CommandRef;

    /// Command removing a module.
    fn remove(&self, module: &Module) -> CommandRef;

    /// Command restarting a module.
    fn restart(&self, module: &Module) -> CommandRef;

    /// Command stopping a module.
    fn stop(&self, module: &Module) -> CommandRef;
}

/// Checks the parts of a module every container target needs.
pub(crate) fn validate_container_module(
    module: &Module,
    target: &'static str,
    supported_types: &[String],
) -> Result<(), PlanError> {
    if !supported_types
        .iter()
        .any(|t| t.eq_ignore_ascii_case(module.module_type()))
    {
        return Err(PlanError::invalid_module(
            module.name(),
            target,
            format!("type '{}' is not supported", module.module_type()),
        ));
    }

    match module.image() {
        Some(image) if !image.trim().is_empty() => Ok(()),
        _ => Err(PlanError::invalid_module(
            module.name(),
            target,
            "config.image is required",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn docker() -> Vec<String> {
        vec![String::from("docker")]
    }

    #[test]
    fn test_docker_module_valid() {
        let module = Module::new("sensor", "1.0", "Docker", json!({"image": "sensor:1"}));
        assert!(validate_container_module(&module, "local", &docker()).is_ok());
    }

    #[test]
    fn test_unknown_type_rejected() {
        let module = Module::new("sensor", "1.0", "unknown", json!({"image": "sensor:1"}));
        let err = validate_container_module(&module, "local", &docker()).unwrap_err();
        assert!(matches!(err, PlanError::InvalidModule { ref name, .. } if name == "sensor"));
    }

    #[test]
    fn test_missing_image_rejected() {
        let module = Module::new("sensor", "1.0", "docker", json!({}));
        assert!(validate_container_module(&module, "local", &docker()).is_err());
    }
}
