use crate::{
    cli::args::{ApplyArgs, ListArgs, ListFormat, RunArgs},
    core::{
        mode::ModifyOutcome, ConfigLoader, ConfigValidator, Environment, PluginRegistry,
        RunOutcome, Runner,
    },
    Result,
};
use anyhow::{anyhow, Context};
use serde_json::json;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn resolve_workspace(workspace: Option<&Path>) -> Result<PathBuf> {
    match workspace {
        Some(path) => Ok(path.to_path_buf()),
        None => env::current_dir().context("failed to resolve current directory"),
    }
}

/// Plugins, builds and git all run in the workspace, so relative paths are anchored there.
fn in_workspace(workspace: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace.join(path)
    }
}

/// Handles `tracefix run`.
pub async fn run(args: RunArgs) -> Result<()> {
    let workspace = resolve_workspace(args.workspace.as_deref())?;
    let target = in_workspace(&workspace, &args.path);
    let env = Arc::new(Environment::from_workspace(&workspace)?);
    let runner = Runner::new(env);

    let outcome = runner
        .run(&args.plugin_type, &args.name, &target, &args.level)
        .await?;
    print_outcome(&outcome, &args.plugin_type, &args.name);
    Ok(())
}

/// Handles `tracefix apply`.
pub async fn apply(args: ApplyArgs) -> Result<()> {
    let workspace = resolve_workspace(args.workspace.as_deref())?;
    let env = Arc::new(Environment::from_workspace(&workspace)?);
    let target = in_workspace(&workspace, &args.path);
    let telemetry_file = match &args.telemetry {
        Some(file) => in_workspace(&workspace, file),
        None => env.telemetry_path(),
    };
    let runner = Runner::new(env);

    let outcome = runner
        .apply(&args.plugin_type, &args.name, &target, &telemetry_file)
        .await?;
    print_outcome(&outcome, &args.plugin_type, &args.name);
    Ok(())
}

/// Handles `tracefix list`.
pub async fn list(args: ListArgs) -> Result<()> {
    let workspace = resolve_workspace(args.workspace.as_deref())?;
    let config = ConfigLoader::load_from_workspace(&workspace)?;
    ConfigValidator::validate(&config)?;
    let registry = PluginRegistry::from_config(&config, &workspace)?;

    match args.format {
        ListFormat::Text => print!("{}", render_plugin_list(&registry)),
        ListFormat::Json => {
            let listing: Vec<_> = registry
                .definitions()
                .map(|definition| {
                    let descriptor = definition.descriptor();
                    json!({
                        "name": descriptor.name,
                        "type": descriptor.plugin_type,
                        "levels": descriptor.levels,
                        "runtime": definition.capabilities().runtime,
                    })
                })
                .collect();
            let rendered = serde_json::to_string_pretty(&listing)
                .map_err(|e| anyhow!("failed to render plugin list: {}", e))?;
            println!("{}", rendered);
        }
    }
    Ok(())
}

fn render_plugin_list(registry: &PluginRegistry) -> String {
    if registry.is_empty() {
        return "No plugins configured. Add [[plugins]] entries to .tracefix.toml.\n".to_string();
    }
    let mut out = String::new();
    for (plugin_type, descriptors) in registry.plugins_by_type() {
        out.push_str(&plugin_type);
        out.push('\n');
        for descriptor in descriptors {
            let levels = if descriptor.levels.is_empty() {
                "any level".to_string()
            } else {
                descriptor.levels.join(", ")
            };
            out.push_str(&format!("  {} ({})\n", descriptor.name, levels));
        }
    }
    out
}

fn print_outcome(outcome: &RunOutcome, plugin_type: &str, name: &str) {
    match &outcome.outcome {
        ModifyOutcome::Applied => println!("Applied {} ({} mode)", name, outcome.mode),
        ModifyOutcome::Persisted(path) => {
            println!("Telemetry written to {}", path.display());
            println!("Review it, then run: tracefix apply {} {}", plugin_type, name);
        }
        ModifyOutcome::Declined(path) => {
            println!("Telemetry kept at {}; no changes applied", path.display());
        }
    }
}
