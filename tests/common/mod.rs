#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracefix::core::build::{BuildOutput, BuildRunner};
use tracefix::core::config::{NavigationOptions, PageSpec, ProjectConfig};
use tracefix::core::git::{VcsError, VcsRunner};
use tracefix::core::human::Confirmer;
use tracefix::core::observer::{Stage, StageObserver};
use tracefix::core::plugin::{
    DynamicPlugin, PluginDescriptor, PluginInputs, PluginRegistry, StaticPlugin,
};
use tracefix::core::probe::{ProbeSession, RuntimeProbe, TelemetryHandle};
use tracefix::core::{AppError, Environment, ErrorCategory, Telemetry};

pub const STATIC_HEADER: &str = "// tracefix: reviewed\n";

pub type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().unwrap().push(entry.into());
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Version control

struct VcsState {
    branches: Vec<String>,
    current: String,
    failing_branch_creations: usize,
    fail_commit: bool,
}

/// In-memory git: tracks branches and the checked-out branch, records every command.
pub struct RecordingVcs {
    state: Mutex<VcsState>,
    commands: Log,
}

impl RecordingVcs {
    pub fn new(initial: &str) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(VcsState {
                branches: vec![initial.to_string()],
                current: initial.to_string(),
                failing_branch_creations: 0,
                fail_commit: false,
            }),
            commands: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn fail_next_branch_creations(&self, count: usize) {
        self.state.lock().unwrap().failing_branch_creations = count;
    }

    pub fn fail_commits(&self) {
        self.state.lock().unwrap().fail_commit = true;
    }

    pub fn commands(&self) -> Vec<String> {
        entries(&self.commands)
    }

    pub fn branches(&self) -> Vec<String> {
        self.state.lock().unwrap().branches.clone()
    }

    pub fn current(&self) -> String {
        self.state.lock().unwrap().current.clone()
    }
}

fn failed(command: &str, stderr: &str) -> VcsError {
    VcsError::Failed {
        command: command.to_string(),
        status: Some(128),
        stderr: stderr.to_string(),
    }
}

#[async_trait]
impl VcsRunner for RecordingVcs {
    async fn run(&self, args: &[&str]) -> Result<String, VcsError> {
        let command = args.join(" ");
        push(&self.commands, command.clone());
        let mut state = self.state.lock().unwrap();

        match args {
            ["branch"] => Ok(state
                .branches
                .iter()
                .map(|branch| {
                    if *branch == state.current {
                        format!("* {}\n", branch)
                    } else {
                        format!("  {}\n", branch)
                    }
                })
                .collect()),
            ["checkout", "-b", name] => {
                if state.failing_branch_creations > 0 {
                    state.failing_branch_creations -= 1;
                    return Err(failed(&command, "fatal: Unable to create '.git/index.lock'"));
                }
                if state.branches.iter().any(|b| b.as_str() == *name) {
                    return Err(failed(&command, "fatal: a branch already exists"));
                }
                state.branches.push(name.to_string());
                state.current = name.to_string();
                Ok(String::new())
            }
            ["checkout", name] => {
                if !state.branches.iter().any(|b| b.as_str() == *name) {
                    return Err(failed(&command, "error: pathspec did not match"));
                }
                state.current = name.to_string();
                Ok(String::new())
            }
            ["branch", "-D", name] => {
                if state.current == *name {
                    return Err(failed(&command, "error: cannot delete the checked out branch"));
                }
                state.branches.retain(|b| b.as_str() != *name);
                Ok(String::new())
            }
            ["commit", ..] if state.fail_commit => Err(failed(&command, "nothing to commit")),
            _ => Ok(String::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime probe

/// Probe whose pages return canned telemetry. Navigation to a url can be slowed down or made to fail.
pub struct ScriptedProbe {
    values: HashMap<String, Value>,
    latencies: HashMap<String, Duration>,
    failing_url: Option<String>,
    events: Log,
}

impl ScriptedProbe {
    pub fn new(values: &[(&str, Value)]) -> Self {
        Self {
            values: values
                .iter()
                .map(|(url, value)| (url.to_string(), value.clone()))
                .collect(),
            latencies: HashMap::new(),
            failing_url: None,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_latency(mut self, url: &str, latency: Duration) -> Self {
        self.latencies.insert(url.to_string(), latency);
        self
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing_url = Some(url.to_string());
        self
    }

    pub fn events(&self) -> Vec<String> {
        entries(&self.events)
    }
}

#[async_trait]
impl RuntimeProbe for ScriptedProbe {
    async fn launch(&self) -> Result<Box<dyn ProbeSession>, AppError> {
        push(&self.events, "launch");
        Ok(Box::new(ScriptedSession {
            values: self.values.clone(),
            latencies: self.latencies.clone(),
            failing_url: self.failing_url.clone(),
            current: None,
            events: Arc::clone(&self.events),
        }))
    }
}

struct ScriptedSession {
    values: HashMap<String, Value>,
    latencies: HashMap<String, Duration>,
    failing_url: Option<String>,
    current: Option<String>,
    events: Log,
}

#[async_trait]
impl ProbeSession for ScriptedSession {
    async fn navigate(&mut self, url: &str, _options: &NavigationOptions) -> Result<(), AppError> {
        push(&self.events, format!("navigate {}", url));
        if self.failing_url.as_deref() == Some(url) {
            return Err(AppError::new(
                ErrorCategory::ProbeError,
                format!("net::ERR_CONNECTION_REFUSED at {}", url),
            ));
        }
        if let Some(latency) = self.latencies.get(url) {
            tokio::time::sleep(*latency).await;
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    async fn wait(&mut self, delay: Duration) -> Result<(), AppError> {
        push(&self.events, format!("wait {}ms", delay.as_millis()));
        Ok(())
    }

    async fn read_global(&mut self, global: &str) -> Result<Box<dyn TelemetryHandle>, AppError> {
        push(&self.events, format!("read {}", global));
        let value = self
            .current
            .as_ref()
            .and_then(|url| self.values.get(url))
            .cloned()
            .unwrap_or(Value::Null);
        Ok(Box::new(RecordingHandle {
            value,
            events: Arc::clone(&self.events),
        }))
    }

    async fn close(self: Box<Self>) -> Result<(), AppError> {
        push(&self.events, "close");
        Ok(())
    }
}

struct RecordingHandle {
    value: Value,
    events: Log,
}

#[async_trait]
impl TelemetryHandle for RecordingHandle {
    async fn json_value(&self) -> Result<Value, AppError> {
        Ok(self.value.clone())
    }

    async fn dispose(self: Box<Self>) -> Result<(), AppError> {
        push(&self.events, "dispose");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Build, confirmation, observer

#[derive(Default)]
pub struct NoopBuild {
    runs: Mutex<usize>,
    fail: bool,
}

impl NoopBuild {
    pub fn failing() -> Self {
        Self {
            runs: Mutex::new(0),
            fail: true,
        }
    }

    pub fn runs(&self) -> usize {
        *self.runs.lock().unwrap()
    }
}

#[async_trait]
impl BuildRunner for NoopBuild {
    async fn build(&self) -> Result<BuildOutput, AppError> {
        *self.runs.lock().unwrap() += 1;
        if self.fail {
            return Err(AppError::new(
                ErrorCategory::BuildError,
                "Build command `npm run build` exited with 1: boom",
            ));
        }
        Ok(BuildOutput {
            exit_code: 0,
            execution_time_ms: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

/// Answers prompts from a queue; accepts once the queue is empty.
#[derive(Default)]
pub struct ScriptedConfirmer {
    answers: Mutex<VecDeque<bool>>,
    prompts: Log,
}

impl ScriptedConfirmer {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        entries(&self.prompts)
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    fn confirmer_type(&self) -> &'static str {
        "scripted"
    }

    async fn confirm(&self, prompt: &str) -> Result<bool, AppError> {
        push(&self.prompts, prompt);
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or(true))
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Log,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        entries(&self.events)
    }
}

impl StageObserver for RecordingObserver {
    fn on_stage_start(&self, stage: &Stage) {
        push(&self.events, format!("start {}", stage));
    }

    fn on_stage_complete(&self, stage: &Stage) {
        push(&self.events, format!("done {}", stage));
    }

    fn on_stage_failed(&self, stage: &Stage, _error: &AppError) {
        push(&self.events, format!("failed {}", stage));
    }
}

// ---------------------------------------------------------------------------
// Fixture plugins

#[derive(Clone, Copy, Default)]
pub struct Behavior {
    pub fail_instrument: bool,
    pub fail_modify: bool,
}

/// Dynamic plugin that appends a marker to every input on instrument and logs the telemetry it receives.
pub struct RecordingDynamicPlugin {
    inputs: PluginInputs,
    log: Log,
    behavior: Behavior,
}

impl RecordingDynamicPlugin {
    pub fn new(inputs: PluginInputs, log: Log, behavior: Behavior) -> Self {
        Self {
            inputs,
            log,
            behavior,
        }
    }
}

#[async_trait]
impl DynamicPlugin for RecordingDynamicPlugin {
    fn inputs(&self) -> &PluginInputs {
        &self.inputs
    }

    async fn instrument(&self) -> Result<(), AppError> {
        push(&self.log, "instrument");
        if self.behavior.fail_instrument {
            return Err(AppError::new(
                ErrorCategory::PluginError,
                "instrumentation failed",
            ));
        }
        for file in self.inputs.files() {
            let mut content = fs::read_to_string(file)?;
            content.push_str("\n// instrumented\n");
            fs::write(file, content)?;
        }
        Ok(())
    }

    async fn modify(&self, telemetry: &Telemetry) -> Result<(), AppError> {
        push(
            &self.log,
            format!("modify {}", serde_json::to_string(telemetry.data())?),
        );
        if self.behavior.fail_modify {
            return Err(AppError::new(ErrorCategory::PluginError, "modify failed"));
        }
        Ok(())
    }
}

/// Static plugin that prepends [`STATIC_HEADER`] to files that lack it. Applying it twice is a no-op.
pub struct IdempotentStaticPlugin {
    inputs: PluginInputs,
    log: Log,
}

impl IdempotentStaticPlugin {
    pub fn new(inputs: PluginInputs, log: Log) -> Self {
        Self { inputs, log }
    }
}

#[async_trait]
impl StaticPlugin for IdempotentStaticPlugin {
    fn inputs(&self) -> &PluginInputs {
        &self.inputs
    }

    async fn modify(&self) -> Result<(), AppError> {
        push(&self.log, "static modify");
        for file in self.inputs.files() {
            let content = fs::read_to_string(file)?;
            if !content.starts_with(STATIC_HEADER) {
                fs::write(file, format!("{}{}", STATIC_HEADER, content))?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness

/// Temp workspace with an `app/` target and every collaborator stubbed.
pub struct Harness {
    pub root: TempDir,
    pub target: PathBuf,
    pub vcs: Arc<RecordingVcs>,
    pub probe: Arc<ScriptedProbe>,
    pub build: Arc<NoopBuild>,
    pub confirmer: Arc<ScriptedConfirmer>,
    pub observer: Arc<RecordingObserver>,
    pub plugin_log: Log,
}

impl Harness {
    pub fn new(probe: ScriptedProbe) -> Self {
        Self::with(probe, NoopBuild::default(), ScriptedConfirmer::default())
    }

    pub fn with(probe: ScriptedProbe, build: NoopBuild, confirmer: ScriptedConfirmer) -> Self {
        let root = TempDir::new().unwrap();
        let target = root.path().join("app");
        fs::create_dir_all(target.join("components")).unwrap();
        fs::write(target.join("components/a.hbs"), "{{name}}").unwrap();
        fs::write(target.join("index.js"), "export default {};").unwrap();

        Self {
            root,
            target,
            vcs: RecordingVcs::new("main"),
            probe: Arc::new(probe),
            build: Arc::new(build),
            confirmer: Arc::new(confirmer),
            observer: Arc::new(RecordingObserver::default()),
            plugin_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn config(&self, pages: &[&str]) -> ProjectConfig {
        let mut config = ProjectConfig::default();
        config.navigation.settle_ms = 0;
        config.navigation.pages = pages.iter().map(|p| PageSpec::Url(p.to_string())).collect();
        config.sandbox.retry_backoff_ms = 0;
        config
    }

    /// `template/disambiguate` (dynamic), `template/broken-instrument`, `template/broken-modify`,
    /// `template/extract-only` and `javascript/header` (static).
    pub fn registry(&self) -> PluginRegistry {
        let mut registry = PluginRegistry::new();
        let dynamic = [
            ("disambiguate", &["extract", "modify", "wizard"][..], Behavior::default()),
            (
                "broken-instrument",
                &[][..],
                Behavior {
                    fail_instrument: true,
                    fail_modify: false,
                },
            ),
            (
                "broken-modify",
                &[][..],
                Behavior {
                    fail_instrument: false,
                    fail_modify: true,
                },
            ),
            ("extract-only", &["extract"][..], Behavior::default()),
        ];
        for (name, levels, behavior) in dynamic {
            let log = Arc::clone(&self.plugin_log);
            registry
                .register_dynamic(
                    PluginDescriptor::new(name, "template").with_levels(levels),
                    move |inputs| {
                        Ok(Box::new(RecordingDynamicPlugin::new(
                            inputs,
                            Arc::clone(&log),
                            behavior,
                        )))
                    },
                )
                .unwrap();
        }

        let log = Arc::clone(&self.plugin_log);
        registry
            .register_static(PluginDescriptor::new("header", "javascript"), move |inputs| {
                Ok(Box::new(IdempotentStaticPlugin::new(inputs, Arc::clone(&log))))
            })
            .unwrap();
        registry
    }

    pub fn environment(&self, pages: &[&str]) -> Arc<Environment> {
        self.environment_with(self.config(pages))
    }

    pub fn environment_with(&self, config: ProjectConfig) -> Arc<Environment> {
        Arc::new(
            Environment::builder(self.root(), config)
                .vcs(self.vcs.clone())
                .probe(self.probe.clone())
                .build_runner(self.build.clone())
                .confirmer(self.confirmer.clone())
                .observer(self.observer.clone())
                .registry(self.registry())
                .build()
                .unwrap(),
        )
    }

    /// Like [`Harness::environment_with`] but plugins come from `config.plugins`.
    pub fn environment_from_config(&self, config: ProjectConfig) -> Arc<Environment> {
        Arc::new(
            Environment::builder(self.root(), config)
                .vcs(self.vcs.clone())
                .probe(self.probe.clone())
                .build_runner(self.build.clone())
                .confirmer(self.confirmer.clone())
                .observer(self.observer.clone())
                .build()
                .unwrap(),
        )
    }

    pub fn read_target(&self, relative: &str) -> String {
        fs::read_to_string(self.target.join(relative)).unwrap()
    }
}
