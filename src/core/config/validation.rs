#![allow(clippy::result_large_err)]

use super::ProjectConfig;
use crate::core::error::AppError;
use crate::core::mode::Level;
use crate::core::types::ErrorCategory;
use std::collections::HashSet;
use std::str::FromStr;
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &ProjectConfig) -> Result<(), AppError> {
        if config.build.trim().is_empty() {
            return Err(invalid("build command cannot be empty"));
        }

        if let Some(base_url) = &config.navigation.base_url {
            Url::parse(base_url)
                .map_err(|e| invalid(format!("navigation.base_url is not a valid url: {}", e)))?;
        }

        for (index, page) in config.navigation.pages.iter().enumerate() {
            if page.normalize().url.trim().is_empty() {
                return Err(invalid(format!(
                    "navigation.pages[{}] has an empty url",
                    index
                )));
            }
        }

        if config.probe.global.trim().is_empty() {
            return Err(invalid("probe.global cannot be empty"));
        }

        if config.sandbox.max_branch_attempts == 0 {
            return Err(invalid("sandbox.max_branch_attempts must be at least 1"));
        }

        if config.sandbox.label.trim().is_empty() {
            return Err(invalid("sandbox.label cannot be empty"));
        }

        let mut seen = HashSet::new();
        for plugin in &config.plugins {
            if !seen.insert(plugin.name.as_str()) {
                return Err(invalid(format!(
                    "plugin \"{}\" is declared more than once",
                    plugin.name
                )));
            }
            if plugin.command.trim().is_empty() {
                return Err(invalid(format!(
                    "plugin \"{}\" has an empty command",
                    plugin.name
                )));
            }
            for level in &plugin.levels {
                Level::from_str(level).map_err(|_| {
                    invalid(format!(
                        "plugin \"{}\" declares unsupported level \"{}\"",
                        plugin.name, level
                    ))
                })?;
            }
        }

        Ok(())
    }
}

fn invalid<T: Into<String>>(message: T) -> AppError {
    AppError::new(ErrorCategory::ValidationError, message)
}
