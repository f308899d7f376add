use crate::cli::args::InitArgs;
use crate::core::config::CONFIG_FILE_NAME;
use crate::Result;
use anyhow::{anyhow, Context};
use std::fs;
use std::path::Path;

const DEFAULT_PROJECT_CONFIG: &str = r#"# Build command run once before telemetry collection
build = "npm run build"

[navigation]
base_url = "http://localhost:4200"
settle_ms = 2000
pages = ["/"]

[probe]
headless = false

[sandbox]
label = "refactor"
max_branch_attempts = 5
retry_backoff_ms = 250
rollback_on_failure = false

# [[plugins]]
# name = "disambiguate"
# type = "template"
# levels = ["extract", "modify", "wizard"]
# runtime = true
# command = "node ./codemods/disambiguate.js"
"#;

const DEFAULT_LOGGING_CONFIG: &str = r#"[logging]
default_level = "info"
enable_file = true
console_output = "stderr"
"#;

/// Handles `tracefix init` by writing `.tracefix.toml` and the logging config.
pub async fn run(args: InitArgs) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => std::env::current_dir().context("failed to resolve current directory")?,
    };

    fs::create_dir_all(&path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    if !path.is_dir() {
        return Err(anyhow!("Path {} is not a directory", path.display()));
    }

    write_project_config(&path, args.force)?;
    write_logging_config(&path)?;

    println!("Initialized tracefix workspace at {}", path.display());
    println!("Declare your plugins in {}, then run: tracefix list", CONFIG_FILE_NAME);
    Ok(())
}

fn write_project_config(root: &Path, force: bool) -> Result<()> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        return Err(anyhow!(
            "{} already exists at {}; pass --force to overwrite it",
            CONFIG_FILE_NAME,
            root.display()
        ));
    }
    fs::write(&config_path, DEFAULT_PROJECT_CONFIG)
        .with_context(|| format!("failed to write {}", config_path.display()))?;
    Ok(())
}

/// Leaves an existing logging config alone.
fn write_logging_config(root: &Path) -> Result<()> {
    let config_dir = root.join(".tracefix").join("config");
    fs::create_dir_all(&config_dir)?;
    let logging_path = config_dir.join("logging.toml");
    if !logging_path.exists() {
        fs::write(&logging_path, DEFAULT_LOGGING_CONFIG)
            .with_context(|| format!("failed to write {}", logging_path.display()))?;
    }
    Ok(())
}
