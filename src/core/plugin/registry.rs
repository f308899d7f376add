use super::{
    capabilities, Capabilities, CapabilityOverrides, DynamicPlugin, ExternalPlugin, PluginInputs,
    PluginInstance, StaticPlugin,
};
use crate::core::config::ProjectConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

type StaticConstructor =
    Arc<dyn Fn(PluginInputs) -> Result<Box<dyn StaticPlugin>, AppError> + Send + Sync>;
type DynamicConstructor =
    Arc<dyn Fn(PluginInputs) -> Result<Box<dyn DynamicPlugin>, AppError> + Send + Sync>;

#[derive(Clone)]
enum Constructor {
    Static(StaticConstructor),
    Dynamic(DynamicConstructor),
}

/// Registry entry as shown to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    /// Levels the plugin accepts; empty means any.
    pub levels: Vec<String>,
}

impl PluginDescriptor {
    pub fn new<N: Into<String>, T: Into<String>>(name: N, plugin_type: T) -> Self {
        Self {
            name: name.into(),
            plugin_type: plugin_type.into(),
            levels: Vec::new(),
        }
    }

    pub fn with_levels(mut self, levels: &[&str]) -> Self {
        self.levels = levels.iter().map(|level| level.to_string()).collect();
        self
    }
}

/// A registered plugin: descriptor, class-level capabilities and a constructor of the matching shape.
#[derive(Clone)]
pub struct PluginDefinition {
    descriptor: PluginDescriptor,
    capabilities: Capabilities,
    constructor: Constructor,
}

impl fmt::Debug for PluginDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginDefinition")
            .field("descriptor", &self.descriptor)
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl PluginDefinition {
    pub fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn supports_level(&self, level: &str) -> bool {
        self.descriptor.levels.is_empty() || self.descriptor.levels.iter().any(|l| l == level)
    }

    /// Snapshot the inputs under `path` and build the plugin.
    pub fn construct(&self, path: &Path) -> Result<PluginInstance, AppError> {
        let inputs = PluginInputs::snapshot(path)?;
        tracing::debug!(
            plugin = %self.descriptor.name,
            inputs = inputs.files().len(),
            "constructing plugin"
        );
        match &self.constructor {
            Constructor::Static(build) => build(inputs).map(PluginInstance::Static),
            Constructor::Dynamic(build) => build(inputs).map(PluginInstance::Dynamic),
        }
    }
}

/// Plugins available to a run, keyed by name in registration order.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    definitions: IndexMap<String, PluginDefinition>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every `[[plugins]]` entry of the project config as an external command.
    pub fn from_config(config: &ProjectConfig, workspace_root: &Path) -> Result<Self, AppError> {
        let mut registry = Self::new();
        for plugin in &config.plugins {
            let descriptor = PluginDescriptor {
                name: plugin.name.clone(),
                plugin_type: plugin.plugin_type.clone(),
                levels: plugin.levels.clone(),
            };
            let command = plugin.command.clone();
            let root = workspace_root.to_path_buf();
            let global = config.probe.global.clone();
            if plugin.runtime {
                registry.register_dynamic(descriptor, move |inputs| {
                    Ok(Box::new(ExternalPlugin::new(&command, &root, &global, inputs)))
                })?;
            } else {
                registry.register_static(descriptor, move |inputs| {
                    Ok(Box::new(ExternalPlugin::new(&command, &root, &global, inputs)))
                })?;
            }
        }
        Ok(registry)
    }

    pub fn register_static<F>(
        &mut self,
        descriptor: PluginDescriptor,
        constructor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(PluginInputs) -> Result<Box<dyn StaticPlugin>, AppError> + Send + Sync + 'static,
    {
        self.insert(PluginDefinition {
            descriptor,
            capabilities: capabilities(None),
            constructor: Constructor::Static(Arc::new(constructor)),
        })
    }

    pub fn register_dynamic<F>(
        &mut self,
        descriptor: PluginDescriptor,
        constructor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(PluginInputs) -> Result<Box<dyn DynamicPlugin>, AppError> + Send + Sync + 'static,
    {
        self.insert(PluginDefinition {
            descriptor,
            capabilities: capabilities(Some(CapabilityOverrides {
                runtime: Some(true),
            })),
            constructor: Constructor::Dynamic(Arc::new(constructor)),
        })
    }

    fn insert(&mut self, definition: PluginDefinition) -> Result<(), AppError> {
        let name = definition.descriptor.name.clone();
        if self.definitions.contains_key(&name) {
            return Err(AppError::new(
                ErrorCategory::ConfigurationError,
                format!("A plugin called \"{}\" is already registered.", name),
            ));
        }
        self.definitions.insert(name, definition);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &PluginDefinition> {
        self.definitions.values()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &PluginDescriptor> {
        self.definitions().map(|d| &d.descriptor)
    }

    /// Distinct plugin types in registration order.
    pub fn types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = Vec::new();
        for descriptor in self.descriptors() {
            if !types.contains(&descriptor.plugin_type.as_str()) {
                types.push(descriptor.plugin_type.as_str());
            }
        }
        types
    }

    pub fn plugins_by_type(&self) -> IndexMap<String, Vec<&PluginDescriptor>> {
        let mut by_type: IndexMap<String, Vec<&PluginDescriptor>> = IndexMap::new();
        for descriptor in self.descriptors() {
            by_type
                .entry(descriptor.plugin_type.clone())
                .or_default()
                .push(descriptor);
        }
        by_type
    }

    pub fn lookup(&self, plugin_type: &str, name: &str) -> Result<&PluginDefinition, AppError> {
        let has_type = self
            .descriptors()
            .any(|descriptor| descriptor.plugin_type == plugin_type);
        if !has_type {
            return Err(AppError::configuration(format!(
                "No type \"{}\" found.",
                plugin_type
            )));
        }

        self.definitions
            .get(name)
            .filter(|definition| definition.descriptor.plugin_type == plugin_type)
            .ok_or_else(|| {
                AppError::configuration(format!("No plugin called \"{}\" was found.", name))
            })
    }
}
