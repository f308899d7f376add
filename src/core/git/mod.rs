#![allow(clippy::result_large_err)]

mod sandbox;

pub use sandbox::VersionControlSandbox;

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

/// Failure of a single version-control invocation.
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("`git {command}` failed: {stderr}")]
    Failed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("failed to execute `git {command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl VcsError {
    pub fn command(&self) -> &str {
        match self {
            VcsError::Failed { command, .. } | VcsError::Spawn { command, .. } => command,
        }
    }

    /// Captured stderr; empty when the process never started.
    pub fn stderr(&self) -> &str {
        match self {
            VcsError::Failed { stderr, .. } => stderr,
            VcsError::Spawn { .. } => "",
        }
    }
}

impl From<VcsError> for AppError {
    fn from(e: VcsError) -> Self {
        let command = e.command().to_string();
        AppError::with_source(ErrorCategory::VcsError, e.to_string(), e)
            .with_context("command", format!("git {}", command))
    }
}

/// Runs version-control subcommands and returns their stdout.
#[async_trait]
pub trait VcsRunner: Send + Sync {
    async fn run(&self, args: &[&str]) -> Result<String, VcsError>;
}

/// `VcsRunner` backed by the `git` executable
pub struct GitRunner {
    workspace_path: PathBuf,
}

impl GitRunner {
    pub fn new(workspace_path: &Path) -> Self {
        Self {
            workspace_path: workspace_path.to_path_buf(),
        }
    }
}

#[async_trait]
impl VcsRunner for GitRunner {
    async fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let command = args.join(" ");
        tracing::debug!(command = %command, "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workspace_path)
            .output()
            .await
            .map_err(|source| VcsError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(VcsError::Failed {
                command,
                status: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
