#![allow(clippy::result_large_err)]

use super::{ProjectConfig, CONFIG_FILE_NAME};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::Path;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from the workspace root (workspace/.tracefix.toml).
    /// Environment variables override config file values.
    /// A missing file is a configuration error: the project has not been initialized.
    pub fn load_from_workspace(workspace_path: &Path) -> Result<ProjectConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_FILE_NAME);
        let mut config = Self::load_from_file(&config_path)?.ok_or_else(|| {
            AppError::configuration(format!(
                "{} not found in the root of the project. Please run `tracefix init`.",
                CONFIG_FILE_NAME
            ))
            .with_context("workspace", workspace_path.display().to_string())
        })?;

        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<ProjectConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: ProjectConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    /// Environment variables take precedence over config file values
    fn apply_env_overrides(config: &mut ProjectConfig) {
        if let Ok(build) = env::var("TRACEFIX_BUILD") {
            config.build = build;
        }

        if let Ok(base_url) = env::var("TRACEFIX_BASE_URL") {
            config.navigation.base_url = Some(base_url);
        }

        if let Ok(settle_str) = env::var("TRACEFIX_SETTLE_MS") {
            if let Ok(settle_ms) = settle_str.parse::<u64>() {
                config.navigation.settle_ms = settle_ms;
            }
        }

        if let Ok(headless_str) = env::var("TRACEFIX_HEADLESS") {
            if let Ok(headless) = headless_str.parse::<bool>() {
                config.probe.headless = headless;
            }
        }

        if let Ok(rollback_str) = env::var("TRACEFIX_ROLLBACK_ON_FAILURE") {
            if let Ok(rollback) = rollback_str.parse::<bool>() {
                config.sandbox.rollback_on_failure = rollback;
            }
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "TRACEFIX_BUILD - Override the build command (default: npm run build)",
            "TRACEFIX_BASE_URL - Override navigation.base_url",
            "TRACEFIX_SETTLE_MS - Override navigation.settle_ms (default: 2000)",
            "TRACEFIX_HEADLESS - Run the browser headless (true/false, default: false)",
            "TRACEFIX_ROLLBACK_ON_FAILURE - Abandon the scratch branch when a run fails (true/false, default: false)",
        ]
    }
}
