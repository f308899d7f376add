use async_trait::async_trait;

pub mod console;

pub use console::ConsoleConfirmer;

/// Blocking operator confirmation, e.g. "the dev server is up".
///
/// There is no timeout: a run waits here for as long as the operator takes.
#[async_trait]
pub trait Confirmer: Send + Sync + 'static {
    /// Human-friendly identifier used in logs.
    fn confirmer_type(&self) -> &'static str;

    async fn confirm(&self, prompt: &str) -> Result<bool, crate::core::error::AppError>;
}

/// Interpret an operator answer. A bare newline accepts, so "press enter" works.
///
/// Callers must detect end of input themselves: it reads as an empty line here.
pub fn parse_answer(line: &str) -> Option<bool> {
    match line.trim().to_lowercase().as_str() {
        "" | "y" | "yes" | "continue" => Some(true),
        "n" | "no" | "abort" => Some(false),
        _ => None,
    }
}
