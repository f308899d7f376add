pub mod build;
pub mod config;
pub mod environment;
pub mod error;
pub mod git;
pub mod human;
pub mod mode;
pub mod observer;
pub mod plugin;
pub mod probe;
pub mod runner;
pub mod telemetry;
pub mod types;

pub use config::{ConfigLoader, ConfigValidator, ProjectConfig};
pub use environment::{Environment, EnvironmentBuilder};
pub use error::{AppError, DefaultErrorReporter, ErrorReporter};
pub use mode::{mode_factory, Level, Mode, ModeState, ModifyOutcome};
pub use plugin::{capabilities, Capabilities, PluginInstance, PluginRegistry};
pub use runner::{RunOutcome, Runner};
pub use telemetry::Telemetry;
pub use types::*;
