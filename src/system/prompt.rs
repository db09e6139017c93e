//! Terminal confirmation prompts.

use anyhow::{Context, Result};
use is_terminal::IsTerminal;

use super::Prompter;
use crate::output::Output;

/// Asks on the terminal; answers "no" when stdin is not a TTY.
pub struct CliPrompter;

impl Prompter for CliPrompter {
    fn confirm(&self, message: &str) -> Result<bool> {
        if !std::io::stdin().is_terminal() {
            Output::warning("Non-interactive mode detected; use --yes to skip prompts.");
            return Ok(false);
        }

        cliclack::confirm(message)
            .initial_value(false)
            .interact()
            .context("Failed to read confirmation")
    }
}
