use super::{invalid_transition, observe, ModeState, ModifyOutcome};
use crate::core::environment::Environment;
use crate::core::error::AppError;
use crate::core::observer::Stage;
use crate::core::plugin::StaticPlugin;
use std::sync::Arc;

/// `modify()` is the entire run, applied to the working branch without a sandbox.
pub struct StaticMode {
    env: Arc<Environment>,
    plugin: Box<dyn StaticPlugin>,
    state: ModeState,
}

impl StaticMode {
    pub fn new(env: Arc<Environment>, plugin: Box<dyn StaticPlugin>) -> Self {
        Self {
            env,
            plugin,
            state: ModeState::Idle,
        }
    }

    pub fn state(&self) -> ModeState {
        self.state
    }

    pub async fn modify(&mut self) -> Result<ModifyOutcome, AppError> {
        if self.state != ModeState::Idle {
            return Err(invalid_transition("modify", "static", self.state));
        }
        tracing::info!(inputs = self.plugin.inputs().files().len(), "applying static plugin");
        let observer = self.env.observer();
        observe(&*observer, Stage::Modify, self.plugin.modify()).await?;
        self.state = ModeState::Modified;
        Ok(ModifyOutcome::Applied)
    }
}
