//! Template context: serializable rendering payload built from a
//! [`ServiceDescriptor`].

use serde::{Deserialize, Serialize};

use formulary_core::service::RESTART_THROTTLE_SECS;
use formulary_core::{Formula, ServiceDescriptor};

use crate::error::RenderError;

/// Flat rendering payload shared by every unit template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceContext {
    pub label: String,
    pub name: String,
    /// One-line unit description (formula `desc`, else a generic line).
    pub description: String,
    /// Formula `desc`, only when the formula declared one.
    pub summary: Option<String>,
    pub version: Option<String>,
    pub program_arguments: Vec<String>,
    pub working_dir: String,
    pub keep_alive: bool,
    pub interval: u64,
    pub throttle: u64,
    pub log_path: String,
    pub error_log_path: String,
    pub environment: Vec<EnvVarCtx>,
    pub config_file: String,
    pub commands: CommandsCtx,
}

/// One injected environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvVarCtx {
    pub key: String,
    pub value: String,
    /// `KEY=value`, pre-joined for formats that take a single token.
    pub assignment: String,
}

/// Operator commands shown in the caveats text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsCtx {
    pub start: String,
    pub stop: String,
    pub logs: String,
}

impl ServiceContext {
    /// Build a [`ServiceContext`] from a descriptor alone.
    ///
    /// `formula_ref` is how the operator names the formula on the command
    /// line (usually the path of the formula file).
    pub fn from_descriptor(descriptor: &ServiceDescriptor, formula_ref: &str) -> Self {
        let environment = descriptor
            .environment
            .iter()
            .map(|(key, value)| EnvVarCtx {
                key: key.clone(),
                value: value.clone(),
                assignment: format!("{key}={value}"),
            })
            .collect();

        let config_file = descriptor
            .environment
            .get(formulary_core::service::ENV_PATH_VAR)
            .cloned()
            .unwrap_or_default();

        let log_path = descriptor.log_path.display().to_string();

        ServiceContext {
            label: descriptor.label(),
            name: descriptor.name.0.clone(),
            description: format!("{} (managed by formulary)", descriptor.name),
            summary: None,
            version: None,
            program_arguments: descriptor.run_command(),
            working_dir: descriptor.working_dir.display().to_string(),
            keep_alive: descriptor.keep_alive,
            interval: descriptor.interval,
            throttle: RESTART_THROTTLE_SECS,
            error_log_path: descriptor.error_log_path.display().to_string(),
            environment,
            config_file,
            commands: CommandsCtx {
                start: format!("formulary service start {formula_ref}"),
                stop: format!("formulary service stop {formula_ref}"),
                logs: format!("tail -f {log_path}"),
            },
            log_path,
        }
    }

    /// Attach release metadata from the formula.
    pub fn with_formula(mut self, formula: &Formula) -> Self {
        if let Some(desc) = formula.desc.as_ref() {
            self.description = desc.clone();
            self.summary = Some(desc.clone());
        }
        self.version = Some(formula.version.to_string());
        self
    }

    /// Convert to a [`tera::Context`] for rendering.
    pub fn to_tera_context(&self) -> Result<tera::Context, RenderError> {
        tera::Context::from_serialize(self).map_err(RenderError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulary_core::{describe_service, FormulaName, InstallLayout};
    use std::path::Path;

    fn descriptor() -> ServiceDescriptor {
        let layout = InstallLayout::new(
            Path::new("/opt/fm"),
            &FormulaName::from("demo-client"),
            "demo.sh",
        );
        describe_service(&layout)
    }

    #[test]
    fn context_fields_populated() {
        let ctx = ServiceContext::from_descriptor(&descriptor(), "demo.yaml");
        assert_eq!(ctx.label, "dev.formulary.demo-client");
        assert_eq!(ctx.program_arguments, vec!["/opt/fm/bin/demo.sh".to_string()]);
        assert_eq!(ctx.config_file, "/opt/fm/etc/demo-client/.env");
        assert_eq!(ctx.environment.len(), 1);
        assert_eq!(
            ctx.environment[0].assignment,
            "ENV_PATH=/opt/fm/etc/demo-client/.env"
        );
        assert_eq!(ctx.commands.start, "formulary service start demo.yaml");
        assert!(ctx.summary.is_none());
    }

    #[test]
    fn to_tera_context_succeeds() {
        let ctx = ServiceContext::from_descriptor(&descriptor(), "demo.yaml");
        ctx.to_tera_context().expect("context conversion");
    }
}
