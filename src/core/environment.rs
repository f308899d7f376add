#![allow(clippy::result_large_err)]

use crate::core::build::{BuildRunner, ShellBuild};
use crate::core::config::{ConfigLoader, ConfigValidator, Page, ProjectConfig};
use crate::core::error::AppError;
use crate::core::git::{GitRunner, VcsRunner, VersionControlSandbox};
use crate::core::human::{Confirmer, ConsoleConfirmer};
use crate::core::observer::{ConsoleObserver, NullObserver, StageObserver};
use crate::core::plugin::PluginRegistry;
use crate::core::probe::{ChromiumProbe, RuntimeProbe};
use crate::core::telemetry::{TelemetryBuilder, TELEMETRY_FILE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Configuration and shared services handed to every mode of a run.
pub struct Environment {
    root: PathBuf,
    config: ProjectConfig,
    pages: Vec<Page>,
    sandbox: VersionControlSandbox,
    probe: Arc<dyn RuntimeProbe>,
    build: Arc<dyn BuildRunner>,
    confirmer: Arc<dyn Confirmer>,
    observer: Arc<dyn StageObserver>,
    registry: PluginRegistry,
    telemetry_builder: TelemetryBuilder,
}

impl Environment {
    pub fn builder(root: &Path, config: ProjectConfig) -> EnvironmentBuilder {
        EnvironmentBuilder {
            root: root.to_path_buf(),
            config,
            vcs: None,
            probe: None,
            build: None,
            confirmer: None,
            observer: None,
            registry: None,
        }
    }

    /// Load `.tracefix.toml` from `root` and wire the real git, browser, build and console services.
    pub fn from_workspace(root: &Path) -> Result<Self, AppError> {
        let config = ConfigLoader::load_from_workspace(root)?;
        ConfigValidator::validate(&config)?;
        Self::builder(root, config)
            .observer(Arc::new(ConsoleObserver::new()))
            .build()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Configured pages in navigation order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn sandbox(&self) -> &VersionControlSandbox {
        &self.sandbox
    }

    pub fn probe(&self) -> Arc<dyn RuntimeProbe> {
        Arc::clone(&self.probe)
    }

    pub fn build_runner(&self) -> Arc<dyn BuildRunner> {
        Arc::clone(&self.build)
    }

    pub fn confirmer(&self) -> Arc<dyn Confirmer> {
        Arc::clone(&self.confirmer)
    }

    pub fn observer(&self) -> Arc<dyn StageObserver> {
        Arc::clone(&self.observer)
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn telemetry_builder(&self) -> &TelemetryBuilder {
        &self.telemetry_builder
    }

    pub fn scratch_label(&self) -> &str {
        &self.config.sandbox.label
    }

    pub fn telemetry_path(&self) -> PathBuf {
        self.root.join(TELEMETRY_FILE)
    }

    /// Join a relative page url onto `navigation.base_url`; absolute urls pass through.
    pub fn resolve_url(&self, page: &Page) -> Result<String, AppError> {
        let base = match &self.config.navigation.base_url {
            Some(base) => base,
            None => return Ok(page.url.clone()),
        };
        if Url::parse(&page.url).is_ok() {
            return Ok(page.url.clone());
        }
        let base = Url::parse(base).map_err(|e| {
            AppError::configuration(format!("navigation.base_url `{}` is invalid: {}", base, e))
        })?;
        base.join(&page.url).map(String::from).map_err(|e| {
            AppError::configuration(format!("Page url `{}` is invalid: {}", page.url, e))
        })
    }

    /// Delay between navigating to `page` and reading its telemetry.
    pub fn settle_for(&self, page: &Page) -> Duration {
        Duration::from_millis(page.wait_for.unwrap_or(self.config.navigation.settle_ms))
    }
}

/// Assembles an [`Environment`], defaulting every service that is not set explicitly.
pub struct EnvironmentBuilder {
    root: PathBuf,
    config: ProjectConfig,
    vcs: Option<Arc<dyn VcsRunner>>,
    probe: Option<Arc<dyn RuntimeProbe>>,
    build: Option<Arc<dyn BuildRunner>>,
    confirmer: Option<Arc<dyn Confirmer>>,
    observer: Option<Arc<dyn StageObserver>>,
    registry: Option<PluginRegistry>,
}

impl EnvironmentBuilder {
    pub fn vcs(mut self, vcs: Arc<dyn VcsRunner>) -> Self {
        self.vcs = Some(vcs);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn RuntimeProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn build_runner(mut self, build: Arc<dyn BuildRunner>) -> Self {
        self.build = Some(build);
        self
    }

    pub fn confirmer(mut self, confirmer: Arc<dyn Confirmer>) -> Self {
        self.confirmer = Some(confirmer);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn registry(mut self, registry: PluginRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> Result<Environment, AppError> {
        let registry = match self.registry {
            Some(registry) => registry,
            None => PluginRegistry::from_config(&self.config, &self.root)?,
        };
        let vcs = self
            .vcs
            .unwrap_or_else(|| Arc::new(GitRunner::new(&self.root)));
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(ChromiumProbe::new(self.config.probe.clone())));
        let build = self
            .build
            .unwrap_or_else(|| Arc::new(ShellBuild::new(self.config.build.clone(), &self.root)));
        let confirmer = self
            .confirmer
            .unwrap_or_else(|| Arc::new(ConsoleConfirmer::new()));
        let observer = self.observer.unwrap_or_else(|| Arc::new(NullObserver));

        let pages = self
            .config
            .navigation
            .pages
            .iter()
            .map(|spec| spec.normalize())
            .collect();

        Ok(Environment {
            sandbox: VersionControlSandbox::new(vcs, &self.config.sandbox),
            telemetry_builder: TelemetryBuilder::new(self.config.probe.global.clone()),
            root: self.root,
            config: self.config,
            pages,
            probe,
            build,
            confirmer,
            observer,
            registry,
        })
    }
}
