//! Progress reporting, kept out of the mode state machine.

use crate::core::error::AppError;
use std::fmt;
use std::sync::Mutex;
use std::time::Instant;

/// Pipeline stage a mode is entering or leaving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Modify,
    Instrument,
    Build,
    AwaitServer,
    Visit { index: usize, url: String },
    Restore,
    Persist,
    Review,
}

impl Stage {
    fn started(&self) -> String {
        match self {
            Stage::Modify => "Applying codemods ...".to_string(),
            Stage::Instrument => "Applying instrumentation ...".to_string(),
            Stage::Build => "Starting build ...".to_string(),
            Stage::AwaitServer => "Waiting for dev server ...".to_string(),
            Stage::Visit { url, .. } => format!("Visiting {} ...", url),
            Stage::Restore => "Restoring working branch ...".to_string(),
            Stage::Persist => "Writing telemetry ...".to_string(),
            Stage::Review => "Waiting for telemetry review ...".to_string(),
        }
    }

    fn completed(&self) -> String {
        match self {
            Stage::Modify => "Applied codemods".to_string(),
            Stage::Instrument => "Applied instrumentation".to_string(),
            Stage::Build => "Build complete".to_string(),
            Stage::AwaitServer => "Server is running".to_string(),
            Stage::Visit { url, .. } => format!("Visited {}", url),
            Stage::Restore => "Restored working branch".to_string(),
            Stage::Persist => "Wrote telemetry".to_string(),
            Stage::Review => "Telemetry reviewed".to_string(),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Modify => write!(f, "modify"),
            Stage::Instrument => write!(f, "instrument"),
            Stage::Build => write!(f, "build"),
            Stage::AwaitServer => write!(f, "await-server"),
            Stage::Visit { index, .. } => write!(f, "visit[{}]", index),
            Stage::Restore => write!(f, "restore"),
            Stage::Persist => write!(f, "persist"),
            Stage::Review => write!(f, "review"),
        }
    }
}

pub trait StageObserver: Send + Sync {
    fn on_stage_start(&self, stage: &Stage);
    fn on_stage_complete(&self, stage: &Stage);
    fn on_stage_failed(&self, _stage: &Stage, _error: &AppError) {}
}

/// Discards every event.
pub struct NullObserver;

impl StageObserver for NullObserver {
    fn on_stage_start(&self, _stage: &Stage) {}
    fn on_stage_complete(&self, _stage: &Stage) {}
}

/// Prints one line per stage transition to stdout, with elapsed time on completion.
pub struct ConsoleObserver {
    started: Mutex<Option<Instant>>,
}

impl ConsoleObserver {
    pub fn new() -> Self {
        Self {
            started: Mutex::new(None),
        }
    }

    fn elapsed(&self) -> Option<std::time::Duration> {
        self.started
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .map(|at| at.elapsed())
    }
}

impl Default for ConsoleObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StageObserver for ConsoleObserver {
    fn on_stage_start(&self, stage: &Stage) {
        if let Ok(mut slot) = self.started.lock() {
            *slot = Some(Instant::now());
        }
        println!("… {}", stage.started());
    }

    fn on_stage_complete(&self, stage: &Stage) {
        match self.elapsed() {
            Some(elapsed) => {
                // Millisecond precision is plenty for a progress line.
                let rounded = std::time::Duration::from_millis(elapsed.as_millis() as u64);
                println!(
                    "✔ {} ({})",
                    stage.completed(),
                    humantime::format_duration(rounded)
                );
            }
            None => println!("✔ {}", stage.completed()),
        }
    }

    fn on_stage_failed(&self, stage: &Stage, error: &AppError) {
        self.elapsed();
        println!("✖ {} failed: {}", stage, error.message);
    }
}
