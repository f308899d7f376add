use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Instant;

pub struct BuildOutput {
    pub exit_code: i32,
    pub execution_time_ms: u64,
    pub stdout: String,
    pub stderr: String,
}

/// The external build that produces the instrumented bundle.
#[async_trait]
pub trait BuildRunner: Send + Sync {
    async fn build(&self) -> Result<BuildOutput, AppError>;
}

/// Runs the configured build command once through `sh -c` from the workspace root.
pub struct ShellBuild {
    command: String,
    workspace_path: PathBuf,
}

impl ShellBuild {
    pub fn new<T: Into<String>>(command: T, workspace_path: &Path) -> Self {
        Self {
            command: command.into(),
            workspace_path: workspace_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl BuildRunner for ShellBuild {
    async fn build(&self) -> Result<BuildOutput, AppError> {
        tracing::info!(command = %self.command, "starting build");
        let started = Instant::now();
        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .current_dir(&self.workspace_path)
            .output()
            .await
            .map_err(|e| {
                AppError::new(
                    ErrorCategory::BuildError,
                    format!("Failed to execute build command `{}`: {}", self.command, e),
                )
            })?;

        let result = BuildOutput {
            exit_code: output.status.code().unwrap_or(-1),
            execution_time_ms: started.elapsed().as_millis() as u64,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        };

        if !output.status.success() {
            return Err(AppError::new(
                ErrorCategory::BuildError,
                format!(
                    "Build command `{}` exited with {}: {}",
                    self.command,
                    result.exit_code,
                    result.stderr.trim()
                ),
            ));
        }

        tracing::info!(elapsed_ms = result.execution_time_ms, "build complete");
        Ok(result)
    }
}
