use crate::core::types::{ErrorCategory, ErrorSeverity};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Context key naming the pipeline stage a failure happened in.
pub const CONTEXT_STAGE: &str = "stage";
/// Context key holding the branch that was checked out before the run.
pub const CONTEXT_ORIGINAL_BRANCH: &str = "original_branch";
/// Context key holding the scratch branch still alive when the run failed.
pub const CONTEXT_SCRATCH_BRANCH: &str = "scratch_branch";

#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
    pub context: BTreeMap<String, String>,
    pub recovery_suggestions: Vec<String>,
    pub occurred_at: DateTime<Utc>,
    pub source: Option<anyhow::Error>,
}

impl AppError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        let severity = match category {
            ErrorCategory::ConfigurationError | ErrorCategory::InternalError => {
                ErrorSeverity::Fatal
            }
            ErrorCategory::ValidationError
            | ErrorCategory::VcsError
            | ErrorCategory::BuildError
            | ErrorCategory::ProbeError
            | ErrorCategory::PluginError
            | ErrorCategory::StateError
            | ErrorCategory::SerializationError
            | ErrorCategory::IoError => ErrorSeverity::Error,
        };
        AppError {
            category,
            severity,
            code: format!("ERR-{}", uuid::Uuid::new_v4()),
            message: message.into(),
            context: BTreeMap::new(),
            recovery_suggestions: vec![],
            occurred_at: Utc::now(),
            source: None,
        }
    }

    /// Shorthand for the error class raised before any mutation begins.
    pub fn configuration<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorCategory::ConfigurationError, message)
    }

    pub fn with_source<T: Into<String>>(
        category: ErrorCategory,
        message: T,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        let mut error = AppError::new(category, message);
        error.source = Some(source.into());
        error
    }

    pub fn with_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_suggestion<T: Into<String>>(mut self, suggestion: T) -> Self {
        self.recovery_suggestions.push(suggestion.into());
        self
    }

    pub fn add_context(&mut self, key: &str, value: &str) {
        self.context.insert(key.to_string(), value.to_string());
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    /// Stage recorded by the runner, if any.
    pub fn stage(&self) -> Option<&str> {
        self.context.get(CONTEXT_STAGE).map(String::as_str)
    }

    pub fn is_configuration(&self) -> bool {
        self.category == ErrorCategory::ConfigurationError
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        if !self.context.is_empty() {
            write!(f, " (Context: {:?})", self.context)?;
        }
        if let Some(ref source) = self.source {
            write!(f, "\nCaused by: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        let message = e.to_string();
        AppError::with_source(ErrorCategory::IoError, message, e)
            .with_code("IO_ERROR")
            .with_suggestion("Check file permissions and paths")
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        let message = e.to_string();
        AppError::with_source(ErrorCategory::SerializationError, message, e)
            .with_code("JSON_ERROR")
    }
}

pub trait ErrorReporter {
    fn report_error(&self, error: &AppError);
}

pub struct DefaultErrorReporter;

impl DefaultErrorReporter {
    pub fn new() -> Self {
        DefaultErrorReporter
    }

    /// Render the block printed for a fatal error. Kept separate from printing so it can be asserted.
    pub fn render(error: &AppError) -> String {
        let mut out = match error.stage() {
            Some(stage) => format!("Error: [{}] {}", stage, error.message),
            None => format!("Error: {}", error.message),
        };
        for (key, value) in error
            .context
            .iter()
            .filter(|(key, _)| key.as_str() != CONTEXT_STAGE)
        {
            out.push_str(&format!("\n  {}: {}", key, value));
        }
        if let Some(ref source) = error.source {
            out.push_str(&format!("\n  Caused by: {}", source));
        }
        for suggestion in &error.recovery_suggestions {
            out.push_str(&format!("\n  hint: {}", suggestion));
        }
        out
    }
}

impl Default for DefaultErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter for DefaultErrorReporter {
    fn report_error(&self, error: &AppError) {
        eprintln!("{}", Self::render(error));
    }
}
