use crate::cli::Command;
use std::env;

/// Execution contexts that influence how logging is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Interactive runs driven from a terminal.
    LocalDev,
    /// Unattended runs (`TRACEFIX_CI=1`) that should be quiet on the console.
    Ci,
}

impl ExecutionContext {
    /// Returns `true` when console sinks are off unless explicitly configured.
    pub fn disables_console(self) -> bool {
        matches!(self, ExecutionContext::Ci)
    }
}

/// Derive the active execution context from a parsed CLI command plus overrides.
pub fn detect_context(command: &Command) -> ExecutionContext {
    if ci_override_enabled() {
        return ExecutionContext::Ci;
    }

    match command {
        Command::Run(_) | Command::Apply(_) | Command::List(_) | Command::Init(_) => {
            ExecutionContext::LocalDev
        }
    }
}

fn ci_override_enabled() -> bool {
    env::var("TRACEFIX_CI")
        .map(|value| value.trim() == "1")
        .unwrap_or(false)
}
