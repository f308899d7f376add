use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

/// File name of the project configuration, looked up in the workspace root.
pub const CONFIG_FILE_NAME: &str = ".tracefix.toml";

/// Project configuration loaded from `.tracefix.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Build command run once before telemetry collection
    #[serde(default = "default_build")]
    pub build: String,

    #[serde(default)]
    pub navigation: NavigationConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// Command-backed plugins available to this project
    #[serde(default)]
    pub plugins: Vec<PluginConfig>,
}

/// Pages to visit and how to visit them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Relative page urls are joined onto this
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Delay between navigation and telemetry read-back when a page sets none
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default)]
    pub pages: Vec<PageSpec>,

    #[serde(default)]
    pub options: NavigationOptions,
}

/// A page entry as written in the config: either a bare url or a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageSpec {
    Url(String),
    Detailed(Page),
}

/// Normalized page entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub url: String,

    /// Settle delay for this page in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<u64>,
}

/// Options shared by every navigation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Browser driver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default)]
    pub headless: bool,

    /// Window global holding the page's telemetry
    #[serde(default = "default_global")]
    pub global: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,
}

/// Scratch branch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default = "default_max_branch_attempts")]
    pub max_branch_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Abandon the scratch branch and return to the original branch when a run fails
    #[serde(default)]
    pub rollback_on_failure: bool,
}

/// A plugin implemented by an external command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub plugin_type: String,

    #[serde(default)]
    pub levels: Vec<String>,

    /// Whether the plugin needs live telemetry
    #[serde(default)]
    pub runtime: bool,

    pub command: String,
}

fn default_build() -> String {
    "npm run build".to_string()
}

fn default_settle_ms() -> u64 {
    2000
}

fn default_global() -> String {
    crate::core::telemetry::TELEMETRY_GLOBAL.to_string()
}

fn default_label() -> String {
    "refactor".to_string()
}

fn default_max_branch_attempts() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    250
}

impl Default for ProjectConfig {
    fn default() -> Self {
        ProjectConfig {
            build: default_build(),
            navigation: NavigationConfig::default(),
            probe: ProbeConfig::default(),
            sandbox: SandboxConfig::default(),
            plugins: Vec::new(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        NavigationConfig {
            base_url: None,
            settle_ms: default_settle_ms(),
            pages: Vec::new(),
            options: NavigationOptions::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig {
            headless: false,
            global: default_global(),
            executable: None,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        SandboxConfig {
            label: default_label(),
            max_branch_attempts: default_max_branch_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            rollback_on_failure: false,
        }
    }
}

impl PageSpec {
    pub fn normalize(&self) -> Page {
        match self {
            PageSpec::Url(url) => Page {
                url: url.clone(),
                wait_for: None,
            },
            PageSpec::Detailed(page) => page.clone(),
        }
    }
}

impl Page {
    pub fn new<T: Into<String>>(url: T) -> Self {
        Page {
            url: url.into(),
            wait_for: None,
        }
    }
}

impl NavigationOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

impl SandboxConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}
