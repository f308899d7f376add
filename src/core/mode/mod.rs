#![allow(clippy::result_large_err)]

//! The run state machine: `Idle → Instrumented → Collected → Modified`.

mod dynamic;
mod static_mode;

pub use dynamic::{ExtractMode, ModifyMode, WizardMode};
pub use static_mode::StaticMode;

use crate::core::environment::Environment;
use crate::core::error::{AppError, CONTEXT_STAGE};
use crate::core::observer::{Stage, StageObserver};
use crate::core::plugin::{Capabilities, PluginInstance};
use crate::core::telemetry::Telemetry;
use crate::core::types::ErrorCategory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Requested run level for a dynamic plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Collect telemetry and persist it for review
    Extract,
    /// Collect telemetry and apply it straight away
    Modify,
    /// Collect, persist, wait for review, then apply
    Wizard,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Extract, Level::Modify, Level::Wizard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Extract => "extract",
            Level::Modify => "modify",
            Level::Wizard => "wizard",
        }
    }
}

impl FromStr for Level {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extract" => Ok(Level::Extract),
            "modify" => Ok(Level::Modify),
            "wizard" => Ok(Level::Wizard),
            other => Err(AppError::configuration(format!(
                "Level \"{}\" is not a supported level.",
                other
            ))),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModeState {
    Idle,
    Instrumented,
    Collected,
    Modified,
}

impl fmt::Display for ModeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// What the final `modify` step of a mode did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModifyOutcome {
    /// The plugin rewrote the source tree
    Applied,
    /// Telemetry was written for a later `apply`
    Persisted(PathBuf),
    /// Telemetry was written but the operator declined to apply it
    Declined(PathBuf),
}

/// The active state machine for one run, tagged by plugin shape and level.
pub enum Mode {
    Static(StaticMode),
    Extract(ExtractMode),
    Modify(ModifyMode),
    Wizard(WizardMode),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Static(_) => "static",
            Mode::Extract(_) => "extract",
            Mode::Modify(_) => "modify",
            Mode::Wizard(_) => "wizard",
        }
    }

    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Mode::Static(_))
    }

    pub fn state(&self) -> ModeState {
        match self {
            Mode::Static(mode) => mode.state(),
            Mode::Extract(mode) => mode.pipeline().state(),
            Mode::Modify(mode) => mode.pipeline().state(),
            Mode::Wizard(mode) => mode.pipeline().state(),
        }
    }

    /// Branch that was checked out when instrumentation started.
    pub fn original_branch(&self) -> Option<&str> {
        match self {
            Mode::Static(_) => None,
            Mode::Extract(mode) => mode.pipeline().original_branch(),
            Mode::Modify(mode) => mode.pipeline().original_branch(),
            Mode::Wizard(mode) => mode.pipeline().original_branch(),
        }
    }

    /// Open the scratch branch and let the plugin inject its instrumentation.
    pub async fn instrument(&mut self) -> Result<(), AppError> {
        match self {
            Mode::Static(mode) => Err(invalid_transition("instrument", "static", mode.state())),
            Mode::Extract(mode) => mode.pipeline_mut().instrument().await,
            Mode::Modify(mode) => mode.pipeline_mut().instrument().await,
            Mode::Wizard(mode) => mode.pipeline_mut().instrument().await,
        }
    }

    /// Build, wait for the dev server, visit every page and return the collected telemetry.
    pub async fn run(&mut self) -> Result<Telemetry, AppError> {
        match self {
            Mode::Static(mode) => Err(invalid_transition("run", "static", mode.state())),
            Mode::Extract(mode) => mode.pipeline_mut().collect().await,
            Mode::Modify(mode) => mode.pipeline_mut().collect().await,
            Mode::Wizard(mode) => mode.pipeline_mut().collect().await,
        }
    }

    pub async fn modify(&mut self, telemetry: Option<Telemetry>) -> Result<ModifyOutcome, AppError> {
        match self {
            Mode::Static(mode) => {
                if telemetry.is_some() {
                    return Err(AppError::new(
                        ErrorCategory::StateError,
                        "Static plugins do not accept telemetry",
                    ));
                }
                mode.modify().await
            }
            Mode::Extract(mode) => mode.modify(telemetry).await,
            Mode::Modify(mode) => mode.modify(telemetry).await,
            Mode::Wizard(mode) => mode.modify(telemetry).await,
        }
    }
}

/// Pick the mode for a plugin from its class-level capabilities and the requested level.
///
/// Static plugins always get [`StaticMode`]; the level must still be a known one.
pub fn mode_factory(
    capabilities: Capabilities,
    level: &str,
    env: Arc<Environment>,
    plugin: PluginInstance,
) -> Result<Mode, AppError> {
    let level = Level::from_str(level)?;

    match (capabilities.runtime, plugin) {
        (false, PluginInstance::Static(plugin)) => Ok(Mode::Static(StaticMode::new(env, plugin))),
        (true, PluginInstance::Dynamic(plugin)) => Ok(match level {
            Level::Extract => Mode::Extract(ExtractMode::new(env, plugin)),
            Level::Modify => Mode::Modify(ModifyMode::new(env, plugin)),
            Level::Wizard => Mode::Wizard(WizardMode::new(env, plugin)),
        }),
        (runtime, _) => Err(AppError::new(
            ErrorCategory::PluginError,
            format!(
                "Plugin shape does not match its declared capabilities (runtime: {})",
                runtime
            ),
        )),
    }
}

/// Run `work` as `stage`, reporting it to the observer and tagging a failure with the stage name.
pub(crate) async fn observe<T, F>(
    observer: &dyn StageObserver,
    stage: Stage,
    work: F,
) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    observer.on_stage_start(&stage);
    match work.await {
        Ok(value) => {
            observer.on_stage_complete(&stage);
            Ok(value)
        }
        Err(mut error) => {
            if error.stage().is_none() {
                error.add_context(CONTEXT_STAGE, &stage.to_string());
            }
            observer.on_stage_failed(&stage, &error);
            Err(error)
        }
    }
}

pub(crate) fn invalid_transition(operation: &str, mode: &str, state: ModeState) -> AppError {
    AppError::new(
        ErrorCategory::StateError,
        format!("Cannot {} in {} mode while {}", operation, mode, state),
    )
    .with_context("state", state.to_string())
}
