//! CLI command implementations
//!
//! `main.rs` parses arguments and dispatches to the helpers here, one module
//! per command group.

pub mod dagster;
pub mod deploy;
pub mod docs;
pub mod ingestion;
pub mod monitor;
pub mod storage;
pub mod system;
pub mod transforms;
pub mod workflow;

use eyre::Result;
use owo_colors::OwoColorize;
use std::io::{BufRead, Write};

/// Ask a yes/no question on the terminal, `assume_yes` skips the prompt
pub fn confirm(prompt: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    print!("{} [y/N]: ", prompt.yellow());
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
