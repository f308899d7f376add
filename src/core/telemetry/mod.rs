#![allow(clippy::result_large_err)]

mod builder;

pub use builder::TelemetryBuilder;

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Window global the instrumented page writes its telemetry into.
pub const TELEMETRY_GLOBAL: &str = "__tracefix_telemetry";

/// File, relative to the workspace root, that carries telemetry between extract and apply.
pub const TELEMETRY_FILE: &str = "tracefix-telemetry.json";

/// Per-page values read back during a run, in navigation order.
///
/// Entry `i` belongs to page `i` of the configured navigation list. Values are recorded as read,
/// including `null` for pages that never set the global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    data: Vec<Value>,
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(data: Vec<Value>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn record(&mut self, value: Value) {
        self.data.push(value);
    }

    /// Write `{"data": [...]}` to `path`, replacing any previous file.
    pub fn persist(&self, path: &Path) -> Result<(), AppError> {
        let content = serde_json::to_vec_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to write telemetry to {}: {}", path.display(), e),
            )
        })?;
        tracing::info!(path = %path.display(), entries = self.len(), "persisted telemetry");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = fs::read(path).map_err(|e| {
            AppError::configuration(format!(
                "Failed to read telemetry from {}: {}",
                path.display(),
                e
            ))
            .with_suggestion("Run the plugin at the extract level first")
        })?;
        serde_json::from_slice(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("Telemetry file {} is not valid: {}", path.display(), e),
            )
        })
    }
}
