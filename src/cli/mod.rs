pub mod args;
pub mod commands;
pub mod init;

pub use args::{ApplyArgs, InitArgs, ListArgs, ListFormat, RunArgs};
use clap::{Parser, Subcommand};

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n";

#[derive(Parser)]
#[command(name = "tracefix")]
#[command(version = crate::VERSION)]
#[command(about = "Run codemods against an app, guided by telemetry collected from a live browser")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: `tracefix run <TYPE> <NAME> ./app --level extract`, review tracefix-telemetry.json, then `tracefix apply <TYPE> <NAME> ./app`."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[command(
        about = "Run a plugin against a target directory",
        long_about = "Run resolves the plugin by type and name. Static plugins rewrite the target directly. Runtime plugins instrument the target on a scratch branch, build, collect telemetry from every configured page, return to the original branch, then persist or apply the telemetry depending on --level.",
        after_help = "Example:\n    tracefix run template disambiguate ./app/templates --level extract"
    )]
    Run(RunArgs),
    #[command(
        about = "Apply persisted telemetry with a runtime plugin",
        long_about = "Apply is the second stage of the extract workflow: it loads tracefix-telemetry.json (or --telemetry) and hands it to the plugin's modify step. No branch, build or browser is involved.",
        after_help = "Example:\n    tracefix apply template disambiguate ./app/templates"
    )]
    Apply(ApplyArgs),
    #[command(
        about = "List configured plugins by type",
        long_about = "List reads the [[plugins]] entries of .tracefix.toml and prints them grouped by type with their levels and capabilities.",
        after_help = "Example:\n    tracefix list --format json"
    )]
    List(ListArgs),
    #[command(
        about = "Write a starter .tracefix.toml",
        long_about = "Init writes a commented .tracefix.toml and .tracefix/config/logging.toml into the workspace.",
        after_help = "Example:\n    tracefix init ."
    )]
    Init(InitArgs),
}

pub async fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Run(run_args) => commands::run(run_args).await,
        Command::Apply(apply_args) => commands::apply(apply_args).await,
        Command::List(list_args) => commands::list(list_args).await,
        Command::Init(init_args) => init::run(init_args).await,
    }
}
