//! Output helpers for consistent CLI output.
//!
//! Status lines use colored prefixes; plan lines use `+`, `-` and `~` markers:
//!
//! ```rust,ignore
//! use dekl::output::Output;
//!
//! Output::header("Packages");
//! Output::added("ripgrep");
//! Output::removed("htop");
//! Output::success("System in sync");
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use std::borrow::Cow;
use std::time::Duration;

/// Standard output helper for consistent CLI formatting.
pub struct Output;

impl Output {
    /// Print a success message with a green checkmark.
    ///
    /// Example: `✓ Installed 3 packages`
    pub fn success(msg: impl AsRef<str>) {
        println!("{} {}", "✓".green().bold(), msg.as_ref());
    }

    /// Print an error message with a red X to stderr.
    pub fn error(msg: impl AsRef<str>) {
        eprintln!("{} {}", "✗".red().bold(), msg.as_ref().red());
    }

    /// Print a warning message with a yellow warning symbol.
    pub fn warning(msg: impl AsRef<str>) {
        println!("{} {}", "⚠".yellow(), msg.as_ref());
    }

    /// Print an info/status message with a cyan arrow.
    ///
    /// Example: `→ Running hook neovim:post`
    pub fn info(msg: impl AsRef<str>) {
        println!("{} {}", "→".cyan(), msg.as_ref().dimmed());
    }

    /// Print a step message (for multi-step operations).
    pub fn step(msg: impl AsRef<str>) {
        println!("  {} {}", "•".cyan(), msg.as_ref());
    }

    /// Print a header/section title.
    pub fn header(msg: impl AsRef<str>) {
        println!("\n{}", msg.as_ref().bold().cyan());
    }

    /// Print a subheader for sections within output.
    pub fn subheader(msg: impl AsRef<str>) {
        println!("{}", msg.as_ref().bold());
    }

    /// Print an item in a list (indented).
    pub fn list_item(msg: impl AsRef<str>) {
        println!("  {}", msg.as_ref());
    }

    /// Print something that will be added.
    ///
    /// Example: `  + ripgrep`
    pub fn added(msg: impl AsRef<str>) {
        println!("  {} {}", "+".green().bold(), msg.as_ref());
    }

    /// Print something that will be removed.
    ///
    /// Example: `  - htop`
    pub fn removed(msg: impl AsRef<str>) {
        println!("  {} {}", "-".red().bold(), msg.as_ref());
    }

    /// Print something that will be changed in place.
    pub fn changed(msg: impl AsRef<str>) {
        println!("  {} {}", "~".yellow().bold(), msg.as_ref());
    }

    /// Print a key-value pair with alignment.
    ///
    /// Example: `  Host:          desktop`
    pub fn kv(key: impl AsRef<str>, value: impl AsRef<str>) {
        println!("  {:<14} {}", format!("{}:", key.as_ref()).cyan(), value.as_ref());
    }

    /// Print a hint/suggestion message (indented with arrow).
    ///
    /// Example: `  → Run: dekl init`
    pub fn hint(msg: impl AsRef<str>) {
        println!("  {} {}", "→".cyan(), msg.as_ref());
    }

    /// Print a dry-run message.
    ///
    /// Example: `[dry-run] Would install 2 packages`
    pub fn dry_run(msg: impl AsRef<str>) {
        println!("{} {}", "[dry-run]".dimmed(), msg.as_ref().dimmed());
    }

    /// Print the running command (for transparency).
    pub fn running(cmd: impl AsRef<str>) {
        println!("{} {}", "Running:".dimmed(), cmd.as_ref().dimmed());
    }

    /// Create a spinner for long-running queries.
    ///
    /// The spinner will animate until you call `finish_*` on it.
    pub fn spinner(msg: impl Into<Cow<'static, str>>) -> Spinner {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(msg);
        pb.enable_steady_tick(Duration::from_millis(80));
        Spinner(pb)
    }

    /// Print a blank line.
    pub fn blank() {
        println!();
    }
}

/// A spinner for long-running operations.
///
/// Created via `Output::spinner()`.
pub struct Spinner(ProgressBar);

impl Spinner {
    /// Finish with an error message.
    pub fn finish_error(self, msg: impl AsRef<str>) {
        self.0
            .finish_with_message(format!("{} {}", "✗".red().bold(), msg.as_ref()));
    }

    /// Finish and clear the line (no final message).
    pub fn finish_clear(self) {
        self.0.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_methods_dont_panic() {
        Output::success("test");
        Output::error("test");
        Output::warning("test");
        Output::info("test");
        Output::step("test");
        Output::header("test");
        Output::subheader("test");
        Output::list_item("test");
        Output::added("test");
        Output::removed("test");
        Output::changed("test");
        Output::hint("test");
        Output::dry_run("test");
        Output::running("test");
        Output::kv("key", "value");
        Output::blank();
    }

    #[test]
    fn test_spinner_lifecycle() {
        let spinner = Output::spinner("Querying pacman...");
        spinner.finish_error("Failed");
        Output::spinner("Querying systemd...").finish_clear();
    }
}
