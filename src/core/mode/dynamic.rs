use super::{invalid_transition, observe, ModeState, ModifyOutcome};
use crate::core::environment::Environment;
use crate::core::error::{AppError, CONTEXT_STAGE};
use crate::core::observer::{Stage, StageObserver};
use crate::core::plugin::DynamicPlugin;
use crate::core::probe::ProbeSession;
use crate::core::telemetry::Telemetry;
use crate::core::types::ErrorCategory;
use std::path::PathBuf;
use std::sync::Arc;

const DEV_SERVER_PROMPT: &str =
    "Please start your dev server. When your server is up please continue.";

/// Instrument and collect phases shared by every dynamic mode.
pub(crate) struct DynamicPipeline {
    mode: &'static str,
    env: Arc<Environment>,
    plugin: Box<dyn DynamicPlugin>,
    state: ModeState,
    original_branch: Option<String>,
    telemetry: Option<Telemetry>,
}

impl DynamicPipeline {
    fn new(mode: &'static str, env: Arc<Environment>, plugin: Box<dyn DynamicPlugin>) -> Self {
        Self {
            mode,
            env,
            plugin,
            state: ModeState::Idle,
            original_branch: None,
            telemetry: None,
        }
    }

    pub(crate) fn state(&self) -> ModeState {
        self.state
    }

    pub(crate) fn original_branch(&self) -> Option<&str> {
        self.original_branch.as_deref()
    }

    fn expect_state(&self, operation: &str, expected: ModeState) -> Result<(), AppError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(invalid_transition(operation, self.mode, self.state))
        }
    }

    pub(crate) async fn instrument(&mut self) -> Result<(), AppError> {
        self.expect_state("instrument", ModeState::Idle)?;
        let env = Arc::clone(&self.env);
        let observer = env.observer();
        let plugin = &self.plugin;

        let mut original = None;
        let result = observe(&*observer, Stage::Instrument, async {
            let sandbox = env.sandbox();
            let branch = sandbox.current_branch().await?;
            original = Some(branch.clone());
            let scratch = sandbox.scratch_branch(env.scratch_label()).await?;
            tracing::info!(original = %branch, scratch = %scratch, "opened scratch branch");
            plugin.instrument().await
        })
        .await;

        self.original_branch = original;
        result?;
        self.state = ModeState::Instrumented;
        Ok(())
    }

    /// Build, confirm the dev server, visit pages in order, then restore the original branch.
    pub(crate) async fn collect(&mut self) -> Result<Telemetry, AppError> {
        self.expect_state("run", ModeState::Instrumented)?;
        let env = Arc::clone(&self.env);
        let observer = env.observer();

        observe(&*observer, Stage::Build, async {
            env.build_runner().build().await.map(|_| ())
        })
        .await?;

        observe(&*observer, Stage::AwaitServer, async {
            if env.confirmer().confirm(DEV_SERVER_PROMPT).await? {
                Ok(())
            } else {
                Err(AppError::new(
                    ErrorCategory::ProbeError,
                    "Dev server was not confirmed, telemetry collection aborted",
                ))
            }
        })
        .await?;

        let mut session = env.probe().launch().await.map_err(|mut e| {
            e.add_context(CONTEXT_STAGE, "launch");
            e
        })?;
        let mut telemetry = Telemetry::new();
        let visited = visit_pages(&env, &*observer, &mut *session, &mut telemetry).await;
        let closed = session.close().await;
        visited?;
        closed?;

        let original = self.original_branch.clone().ok_or_else(|| {
            AppError::new(
                ErrorCategory::StateError,
                "No original branch was recorded during instrumentation",
            )
        })?;
        observe(&*observer, Stage::Restore, env.sandbox().restore(&original)).await?;

        self.telemetry = Some(telemetry.clone());
        self.state = ModeState::Collected;
        Ok(telemetry)
    }

    fn take_telemetry(&mut self, given: Option<Telemetry>) -> Result<Telemetry, AppError> {
        given.or_else(|| self.telemetry.take()).ok_or_else(|| {
            AppError::new(
                ErrorCategory::StateError,
                format!("No telemetry available for {} mode", self.mode),
            )
        })
    }

    async fn persist(&self, telemetry: &Telemetry) -> Result<PathBuf, AppError> {
        let path = self.env.telemetry_path();
        let observer = self.env.observer();
        observe(&*observer, Stage::Persist, async { telemetry.persist(&path) }).await?;
        Ok(path)
    }

    async fn apply(&mut self, telemetry: &Telemetry) -> Result<(), AppError> {
        let observer = self.env.observer();
        observe(&*observer, Stage::Modify, self.plugin.modify(telemetry)).await?;
        self.state = ModeState::Modified;
        Ok(())
    }
}

async fn visit_pages(
    env: &Environment,
    observer: &dyn StageObserver,
    session: &mut dyn ProbeSession,
    telemetry: &mut Telemetry,
) -> Result<(), AppError> {
    let global = env.config().probe.global.as_str();
    let options = &env.config().navigation.options;

    for (index, page) in env.pages().iter().enumerate() {
        let url = env.resolve_url(page)?;
        let settle = env.settle_for(page);
        let stage = Stage::Visit {
            index,
            url: url.clone(),
        };
        let value = observe(observer, stage, async {
            session.navigate(&url, options).await?;
            session.wait(settle).await?;
            let handle = session.read_global(global).await?;
            let value = handle.json_value().await?;
            handle.dispose().await?;
            Ok(value)
        })
        .await?;

        if value.is_null() {
            tracing::warn!(index, url = %url, global, "telemetry global was not set");
        }
        telemetry.record(value);
    }
    Ok(())
}

/// Collect telemetry and persist it for review; nothing is applied.
pub struct ExtractMode {
    pipeline: DynamicPipeline,
}

impl ExtractMode {
    pub fn new(env: Arc<Environment>, plugin: Box<dyn DynamicPlugin>) -> Self {
        Self {
            pipeline: DynamicPipeline::new("extract", env, plugin),
        }
    }

    pub(crate) fn pipeline(&self) -> &DynamicPipeline {
        &self.pipeline
    }

    pub(crate) fn pipeline_mut(&mut self) -> &mut DynamicPipeline {
        &mut self.pipeline
    }

    pub async fn modify(&mut self, telemetry: Option<Telemetry>) -> Result<ModifyOutcome, AppError> {
        self.pipeline.expect_state("modify", ModeState::Collected)?;
        let telemetry = self.pipeline.take_telemetry(telemetry)?;
        let path = self.pipeline.persist(&telemetry).await?;
        self.pipeline.state = ModeState::Modified;
        Ok(ModifyOutcome::Persisted(path))
    }
}

/// Collect telemetry and hand it straight to the plugin.
pub struct ModifyMode {
    pipeline: DynamicPipeline,
}

impl ModifyMode {
    pub fn new(env: Arc<Environment>, plugin: Box<dyn DynamicPlugin>) -> Self {
        Self {
            pipeline: DynamicPipeline::new("modify", env, plugin),
        }
    }

    /// Start in `Collected`, for applying telemetry persisted by an earlier extract run.
    pub fn resume(env: Arc<Environment>, plugin: Box<dyn DynamicPlugin>) -> Self {
        let mut mode = Self::new(env, plugin);
        mode.pipeline.state = ModeState::Collected;
        mode
    }

    pub(crate) fn pipeline(&self) -> &DynamicPipeline {
        &self.pipeline
    }

    pub(crate) fn pipeline_mut(&mut self) -> &mut DynamicPipeline {
        &mut self.pipeline
    }

    pub async fn modify(&mut self, telemetry: Option<Telemetry>) -> Result<ModifyOutcome, AppError> {
        self.pipeline.expect_state("modify", ModeState::Collected)?;
        let telemetry = self.pipeline.take_telemetry(telemetry)?;
        self.pipeline.apply(&telemetry).await?;
        Ok(ModifyOutcome::Applied)
    }
}

/// Collect and persist telemetry, let the operator review the file, then apply what is on disk.
pub struct WizardMode {
    pipeline: DynamicPipeline,
}

impl WizardMode {
    pub fn new(env: Arc<Environment>, plugin: Box<dyn DynamicPlugin>) -> Self {
        Self {
            pipeline: DynamicPipeline::new("wizard", env, plugin),
        }
    }

    pub(crate) fn pipeline(&self) -> &DynamicPipeline {
        &self.pipeline
    }

    pub(crate) fn pipeline_mut(&mut self) -> &mut DynamicPipeline {
        &mut self.pipeline
    }

    pub async fn modify(&mut self, telemetry: Option<Telemetry>) -> Result<ModifyOutcome, AppError> {
        self.pipeline.expect_state("modify", ModeState::Collected)?;
        let telemetry = self.pipeline.take_telemetry(telemetry)?;
        let path = self.pipeline.persist(&telemetry).await?;

        let env = Arc::clone(&self.pipeline.env);
        let observer = env.observer();
        let prompt = format!(
            "Telemetry written to {}. Review or edit it, then continue to apply it.",
            path.display()
        );
        let reviewed = observe(&*observer, Stage::Review, async {
            if env.confirmer().confirm(&prompt).await? {
                Telemetry::load(&path).map(Some)
            } else {
                Ok(None)
            }
        })
        .await?;

        match reviewed {
            Some(reviewed) => {
                self.pipeline.apply(&reviewed).await?;
                Ok(ModifyOutcome::Applied)
            }
            None => {
                tracing::info!(path = %path.display(), "operator declined to apply telemetry");
                self.pipeline.state = ModeState::Modified;
                Ok(ModifyOutcome::Declined(path))
            }
        }
    }
}
