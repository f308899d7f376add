#![allow(clippy::result_large_err)]

mod external;
mod registry;

pub use external::ExternalPlugin;
pub use registry::{PluginDefinition, PluginDescriptor, PluginRegistry};

use crate::core::error::AppError;
use crate::core::telemetry::Telemetry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Capability record attached to a plugin definition, read before the plugin is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Whether the plugin needs live telemetry
    pub runtime: bool,
}

/// Partial capability record merged over the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityOverrides {
    pub runtime: Option<bool>,
}

/// Build a capability record: `runtime: false` unless overridden.
pub fn capabilities(overrides: Option<CapabilityOverrides>) -> Capabilities {
    let mut caps = Capabilities::default();
    if let Some(CapabilityOverrides {
        runtime: Some(runtime),
    }) = overrides
    {
        caps.runtime = runtime;
    }
    caps
}

/// Files under a plugin's target directory, captured when the plugin is constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInputs {
    root: PathBuf,
    files: Vec<PathBuf>,
}

impl PluginInputs {
    /// Walk `root` recursively. Paths are sorted and prefixed with `root`.
    pub fn snapshot(root: &Path) -> Result<Self, AppError> {
        if !root.is_dir() {
            return Err(AppError::configuration(format!(
                "Target path {} is not a directory",
                root.display()
            )));
        }
        let mut files = Vec::new();
        collect_files(root, &mut files)?;
        files.sort();
        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn from_files(root: &Path, files: Vec<PathBuf>) -> Self {
        Self {
            root: root.to_path_buf(),
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), AppError> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// Transformation applied directly to source, no telemetry.
#[async_trait]
pub trait StaticPlugin: Send + Sync {
    fn inputs(&self) -> &PluginInputs;

    async fn modify(&self) -> Result<(), AppError>;
}

/// Transformation that instruments the app first and rewrites source from collected telemetry.
#[async_trait]
pub trait DynamicPlugin: Send + Sync {
    fn inputs(&self) -> &PluginInputs;

    /// Inject telemetry-emitting code into the inputs.
    async fn instrument(&self) -> Result<(), AppError>;

    async fn modify(&self, telemetry: &Telemetry) -> Result<(), AppError>;
}

/// A constructed plugin, tagged by shape.
pub enum PluginInstance {
    Static(Box<dyn StaticPlugin>),
    Dynamic(Box<dyn DynamicPlugin>),
}

impl PluginInstance {
    pub fn inputs(&self) -> &PluginInputs {
        match self {
            PluginInstance::Static(plugin) => plugin.inputs(),
            PluginInstance::Dynamic(plugin) => plugin.inputs(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, PluginInstance::Dynamic(_))
    }
}
