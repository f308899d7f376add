use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct RunArgs {
    /// Plugin type, e.g. `template` or `javascript`
    #[arg(value_name = "TYPE")]
    pub plugin_type: String,

    /// Plugin name as declared in .tracefix.toml
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Directory whose files the plugin operates on, relative to the workspace
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// extract, modify or wizard (ignored by static plugins)
    #[arg(long, default_value = "modify", value_name = "LEVEL")]
    pub level: String,

    /// Directory containing .tracefix.toml (default: current directory)
    #[arg(long, value_name = "DIR", help_heading = "Configuration")]
    pub workspace: Option<PathBuf>,
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Plugin type, e.g. `template` or `javascript`
    #[arg(value_name = "TYPE")]
    pub plugin_type: String,

    /// Plugin name as declared in .tracefix.toml
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Directory whose files the plugin operates on, relative to the workspace
    #[arg(value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Telemetry file to apply, relative to the workspace (default: tracefix-telemetry.json)
    #[arg(long, value_name = "FILE")]
    pub telemetry: Option<PathBuf>,

    /// Directory containing .tracefix.toml (default: current directory)
    #[arg(long, value_name = "DIR", help_heading = "Configuration")]
    pub workspace: Option<PathBuf>,
}

#[derive(Args)]
pub struct ListArgs {
    /// Directory containing .tracefix.toml (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub workspace: Option<PathBuf>,

    /// Emit either terminal-friendly text or machine-readable JSON
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: ListFormat,
}

#[derive(Clone, clap::ValueEnum, Debug)]
pub enum ListFormat {
    /// One block per plugin type
    Text,
    /// Array of plugin descriptors
    Json,
}

#[derive(Args)]
pub struct InitArgs {
    /// Workspace to initialize (default: current directory)
    #[arg(value_name = "PATH")]
    pub path: Option<PathBuf>,

    /// Overwrite an existing .tracefix.toml
    #[arg(long)]
    pub force: bool,
}
