use super::{DynamicPlugin, PluginInputs, StaticPlugin};
use crate::core::error::AppError;
use crate::core::telemetry::Telemetry;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A plugin implemented by a shell command declared in `.tracefix.toml`.
///
/// The command receives its phase and inputs through environment variables:
///
/// * `TRACEFIX_PHASE` - `instrument` or `modify`
/// * `TRACEFIX_TARGET` - the target directory
/// * `TRACEFIX_INPUTS` - file listing the input snapshot, one path per line
/// * `TRACEFIX_GLOBAL` - the window global telemetry is written to
/// * `TRACEFIX_TELEMETRY` - JSON telemetry file (dynamic modify only)
pub struct ExternalPlugin {
    command: String,
    workspace_path: PathBuf,
    global: String,
    inputs: PluginInputs,
}

impl ExternalPlugin {
    pub fn new(command: &str, workspace_path: &Path, global: &str, inputs: PluginInputs) -> Self {
        Self {
            command: command.to_string(),
            workspace_path: workspace_path.to_path_buf(),
            global: global.to_string(),
            inputs,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    async fn invoke(&self, phase: &str, telemetry: Option<&Telemetry>) -> Result<(), AppError> {
        let inputs_file = self.write_inputs()?;
        let telemetry_file = match telemetry {
            Some(telemetry) => Some(write_telemetry(telemetry)?),
            None => None,
        };

        let mut env_vars = HashMap::new();
        env_vars.insert("TRACEFIX_PHASE", phase.to_string());
        env_vars.insert(
            "TRACEFIX_TARGET",
            self.inputs.root().display().to_string(),
        );
        env_vars.insert(
            "TRACEFIX_INPUTS",
            inputs_file.path().display().to_string(),
        );
        env_vars.insert("TRACEFIX_GLOBAL", self.global.clone());
        if let Some(file) = &telemetry_file {
            env_vars.insert("TRACEFIX_TELEMETRY", file.path().display().to_string());
        }

        tracing::debug!(command = %self.command, phase, "invoking plugin command");
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.workspace_path)
            .envs(env_vars)
            .output()
            .await
            .map_err(|e| {
                AppError::new(
                    ErrorCategory::PluginError,
                    format!("Failed to execute plugin command `{}`: {}", self.command, e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(AppError::new(
                ErrorCategory::PluginError,
                format!(
                    "Plugin command `{}` failed during {} with {}: {}",
                    self.command,
                    phase,
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
            )
            .with_context("phase", phase));
        }
        Ok(())
    }

    fn write_inputs(&self) -> Result<NamedTempFile, AppError> {
        let mut file = NamedTempFile::new()?;
        for path in self.inputs.files() {
            writeln!(file, "{}", path.display())?;
        }
        file.flush()?;
        Ok(file)
    }
}

fn write_telemetry(telemetry: &Telemetry) -> Result<NamedTempFile, AppError> {
    let mut file = NamedTempFile::new()?;
    serde_json::to_writer(&mut file, telemetry)?;
    file.flush()?;
    Ok(file)
}

#[async_trait]
impl StaticPlugin for ExternalPlugin {
    fn inputs(&self) -> &PluginInputs {
        &self.inputs
    }

    async fn modify(&self) -> Result<(), AppError> {
        self.invoke("modify", None).await
    }
}

#[async_trait]
impl DynamicPlugin for ExternalPlugin {
    fn inputs(&self) -> &PluginInputs {
        &self.inputs
    }

    async fn instrument(&self) -> Result<(), AppError> {
        self.invoke("instrument", None).await
    }

    async fn modify(&self, telemetry: &Telemetry) -> Result<(), AppError> {
        self.invoke("modify", Some(telemetry)).await
    }
}
