//! Abstraction over external command execution.
//!
//! Every adapter in [`crate::system`] goes through [`CommandRunner`], so the
//! pacman, systemctl and script adapters can be exercised without spawning
//! processes.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Output};

/// Trait for abstracting external command execution.
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its full output (stdout + stderr + exit status).
    ///
    /// Used for queries whose output is parsed.
    fn run_output(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<Output>;

    /// Run a command and return only its exit status (inherits stdio).
    ///
    /// Used for installs, removals, service toggles and hook scripts so the
    /// user sees the tool's own progress and prompts.
    fn run_status(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> Result<ExitStatus>;
}

/// Options for command execution.
#[derive(Debug, Default, Clone)]
pub struct CommandOptions {
    /// Working directory for the command.
    pub cwd: Option<PathBuf>,
    /// Additional environment variables.
    pub env: Vec<(String, String)>,
}

impl CommandOptions {
    /// Create options with a working directory.
    pub fn with_cwd(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: Some(cwd.into()),
            ..Default::default()
        }
    }

    /// Add environment variables.
    pub fn envs(mut self, env: &[(String, String)]) -> Self {
        self.env.extend(env.iter().cloned());
        self
    }
}

/// Render a command line for display, quoting arguments as a shell would.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let words = std::iter::once(program).chain(args.iter().copied());
    shlex::try_join(words).unwrap_or_else(|_| format!("{} {}", program, args.join(" ")))
}

/// Production implementation that delegates to [`std::process::Command`].
pub struct RealCommandRunner;

impl RealCommandRunner {
    fn command(program: &str, args: &[&str], options: &CommandOptions) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(cwd) = &options.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &options.env {
            cmd.env(k, v);
        }
        cmd
    }
}

impl CommandRunner for RealCommandRunner {
    fn run_output(&self, program: &str, args: &[&str], options: &CommandOptions) -> Result<Output> {
        tracing::debug!(command = %display_command(program, args), "Running query");
        Self::command(program, args, options)
            .output()
            .with_context(|| format!("Failed to run '{program}'"))
    }

    fn run_status(
        &self,
        program: &str,
        args: &[&str],
        options: &CommandOptions,
    ) -> Result<ExitStatus> {
        let line = display_command(program, args);
        tracing::debug!(command = %line, "Running command");
        crate::output::Output::running(&line);
        Self::command(program, args, options)
            .status()
            .with_context(|| format!("Failed to run '{program}'"))
    }
}

/// Test double that records command lines and returns canned responses.
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockCommandRunner {
        calls: Mutex<Vec<String>>,
        responses: Vec<(String, i32, String, String)>,
    }

    impl MockCommandRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Respond to command lines starting with `prefix`. First match wins;
        /// unmatched commands succeed with empty output.
        pub fn respond(mut self, prefix: &str, code: i32, stdout: &str) -> Self {
            self.responses
                .push((prefix.to_string(), code, stdout.to_string(), String::new()));
            self
        }

        /// Like [`respond`](Self::respond), but writing to stderr.
        pub fn respond_stderr(mut self, prefix: &str, code: i32, stderr: &str) -> Self {
            self.responses
                .push((prefix.to_string(), code, String::new(), stderr.to_string()));
            self
        }

        /// Every command line run so far, words joined by single spaces.
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn answer(&self, program: &str, args: &[&str]) -> Output {
            let line = std::iter::once(program)
                .chain(args.iter().copied())
                .collect::<Vec<_>>()
                .join(" ");
            self.calls.lock().unwrap().push(line.clone());
            let (code, stdout, stderr) = self
                .responses
                .iter()
                .find(|(prefix, ..)| line.starts_with(prefix.as_str()))
                .map(|(_, code, out, err)| (*code, out.clone(), err.clone()))
                .unwrap_or_default();
            Output {
                status: ExitStatus::from_raw(code << 8),
                stdout: stdout.into_bytes(),
                stderr: stderr.into_bytes(),
            }
        }
    }

    impl CommandRunner for MockCommandRunner {
        fn run_output(
            &self,
            program: &str,
            args: &[&str],
            _options: &CommandOptions,
        ) -> Result<Output> {
            Ok(self.answer(program, args))
        }

        fn run_status(
            &self,
            program: &str,
            args: &[&str],
            _options: &CommandOptions,
        ) -> Result<ExitStatus> {
            Ok(self.answer(program, args).status)
        }
    }
}
