#![allow(clippy::result_large_err)]

use crate::core::environment::Environment;
use crate::core::error::{AppError, CONTEXT_ORIGINAL_BRANCH, CONTEXT_SCRATCH_BRANCH};
use crate::core::mode::{mode_factory, Level, Mode, ModifyMode, ModifyOutcome};
use crate::core::plugin::PluginInstance;
use crate::core::telemetry::Telemetry;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Result of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub mode: &'static str,
    /// Collected telemetry (dynamic modes only)
    pub telemetry: Option<Telemetry>,
    pub outcome: ModifyOutcome,
    pub original_branch: Option<String>,
}

/// Resolves a plugin and drives its mode from `Idle` to `Modified`.
pub struct Runner {
    env: Arc<Environment>,
}

impl Runner {
    pub fn new(env: Arc<Environment>) -> Self {
        Self { env }
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Run plugin `name` of `plugin_type` against `path` at `level`.
    ///
    /// Lookup, level and capability problems are reported before the working tree is touched.
    /// Mid-run failures carry the failing stage and both branch names in their context.
    pub async fn run(
        &self,
        plugin_type: &str,
        name: &str,
        path: &Path,
        level: &str,
    ) -> Result<RunOutcome, AppError> {
        let definition = self.env.registry().lookup(plugin_type, name)?;
        let parsed = Level::from_str(level)?;
        if !definition.supports_level(parsed.as_str()) {
            return Err(AppError::configuration(format!(
                "Plugin \"{}\" does not support the {} level.",
                name, parsed
            ))
            .with_suggestion(format!(
                "Supported levels: {}",
                definition.descriptor().levels.join(", ")
            )));
        }

        let capabilities = definition.capabilities();
        let plugin = definition.construct(path)?;
        let mut mode = mode_factory(capabilities, level, Arc::clone(&self.env), plugin)?;
        tracing::info!(
            plugin = name,
            plugin_type,
            mode = mode.name(),
            path = %path.display(),
            "starting run"
        );

        if !mode.is_dynamic() {
            let outcome = mode.modify(None).await?;
            return Ok(RunOutcome {
                mode: mode.name(),
                telemetry: None,
                outcome,
                original_branch: None,
            });
        }

        match drive_dynamic(&mut mode).await {
            Ok((telemetry, outcome)) => {
                tracing::info!(mode = mode.name(), entries = telemetry.len(), "run complete");
                Ok(RunOutcome {
                    mode: mode.name(),
                    telemetry: Some(telemetry),
                    outcome,
                    original_branch: mode.original_branch().map(str::to_string),
                })
            }
            Err(error) => Err(self.recover(&mode, error).await),
        }
    }

    /// Apply persisted telemetry with a dynamic plugin; no sandbox, build or probe is involved.
    pub async fn apply(
        &self,
        plugin_type: &str,
        name: &str,
        path: &Path,
        telemetry_file: &Path,
    ) -> Result<RunOutcome, AppError> {
        let definition = self.env.registry().lookup(plugin_type, name)?;
        if !definition.capabilities().runtime {
            return Err(AppError::configuration(format!(
                "Plugin \"{}\" does not use telemetry; run it with `tracefix run` instead.",
                name
            )));
        }
        let telemetry = Telemetry::load(telemetry_file)?;
        let plugin = match definition.construct(path)? {
            PluginInstance::Dynamic(plugin) => plugin,
            PluginInstance::Static(_) => {
                return Err(AppError::configuration(format!(
                    "Plugin \"{}\" is not a dynamic plugin.",
                    name
                )))
            }
        };

        tracing::info!(
            plugin = name,
            telemetry = %telemetry_file.display(),
            entries = telemetry.len(),
            "applying persisted telemetry"
        );
        let mut mode = Mode::Modify(ModifyMode::resume(Arc::clone(&self.env), plugin));
        let outcome = mode.modify(Some(telemetry.clone())).await?;
        Ok(RunOutcome {
            mode: mode.name(),
            telemetry: Some(telemetry),
            outcome,
            original_branch: None,
        })
    }

    async fn recover(&self, mode: &Mode, mut error: AppError) -> AppError {
        let sandbox = self.env.sandbox();
        let scratch = sandbox.scratch_branch_name();
        let original = mode.original_branch().map(str::to_string);

        if let Some(original) = &original {
            error.add_context(CONTEXT_ORIGINAL_BRANCH, original);
        }
        let Some(scratch) = scratch else {
            return error;
        };
        error.add_context(CONTEXT_SCRATCH_BRANCH, &scratch);

        match (&original, self.env.config().sandbox.rollback_on_failure) {
            (Some(original), true) => match sandbox.abandon(original).await {
                Ok(()) => {
                    tracing::warn!(original = %original, scratch = %scratch, "rolled back scratch branch");
                    error.add_context("rolled_back", "true");
                }
                Err(rollback) => {
                    tracing::error!(error = %rollback, "rollback failed");
                    error = with_manual_recovery(error, original, &scratch);
                }
            },
            (Some(original), false) => {
                error = with_manual_recovery(error, original, &scratch);
            }
            (None, _) => {}
        }
        error
    }
}

async fn drive_dynamic(mode: &mut Mode) -> Result<(Telemetry, ModifyOutcome), AppError> {
    mode.instrument().await?;
    let telemetry = mode.run().await?;
    let outcome = mode.modify(Some(telemetry.clone())).await?;
    Ok((telemetry, outcome))
}

fn with_manual_recovery(error: AppError, original: &str, scratch: &str) -> AppError {
    error
        .with_suggestion(format!("git checkout {}", original))
        .with_suggestion(format!("git branch -D {}", scratch))
}
