use crate::core::error::AppError;
use crate::core::human::{parse_answer, Confirmer};
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use std::io::{self, BufRead, Write};
use tokio::task::spawn_blocking;

pub struct ConsoleConfirmer;

impl ConsoleConfirmer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

/// Prompt until an answer parses. Input that ends before an answer declines.
fn read_answer(reader: &mut dyn BufRead, prompt: &str) -> Result<bool, AppError> {
    loop {
        print!("{} [Y/n]: ", prompt);
        io::stdout().flush().ok();

        let mut buffer = String::new();
        let read = reader.read_line(&mut buffer).map_err(|err| {
            AppError::new(
                ErrorCategory::IoError,
                format!("failed to read stdin: {}", err),
            )
        })?;
        if read == 0 {
            println!();
            tracing::warn!(prompt, "stdin closed before an answer; declining");
            return Ok(false);
        }

        match parse_answer(&buffer) {
            Some(answer) => return Ok(answer),
            None => println!("Please respond with 'y' or 'n'."),
        }
    }
}

#[async_trait]
impl Confirmer for ConsoleConfirmer {
    fn confirmer_type(&self) -> &'static str {
        "console"
    }

    async fn confirm(&self, prompt: &str) -> Result<bool, AppError> {
        let prompt = prompt.to_string();
        spawn_blocking(move || read_answer(&mut io::stdin().lock(), &prompt))
            .await
            .map_err(|err| {
                AppError::new(
                    ErrorCategory::InternalError,
                    format!("console input task cancelled: {}", err),
                )
            })?
    }
}
