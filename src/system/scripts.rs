//! Hook script adapter.

use anyhow::Result;
use std::path::Path;
use std::process::ExitStatus;
use std::sync::Arc;

use super::{ScriptRunner, is_root};
use crate::command_runner::{CommandOptions, CommandRunner};

/// Runs hook scripts with `bash` from the script's own directory.
pub struct BashScripts {
    runner: Arc<dyn CommandRunner>,
}

impl BashScripts {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl ScriptRunner for BashScripts {
    fn run(&self, script: &Path, root: bool, env: &[(String, String)]) -> Result<ExitStatus> {
        let mut options = CommandOptions::default().envs(env);
        if let Some(dir) = script.parent() {
            options.cwd = Some(dir.to_path_buf());
        }
        let path = script.to_string_lossy();
        let script: &str = &path;

        if root && !is_root() {
            // sudo scrubs the environment unless told which names to keep.
            let keep = env
                .iter()
                .map(|(k, _)| k.as_str())
                .collect::<Vec<_>>()
                .join(",");
            let preserve = format!("--preserve-env={keep}");
            self.runner
                .run_status("sudo", &[preserve.as_str(), "bash", script], &options)
        } else {
            self.runner.run_status("bash", &[script], &options)
        }
    }
}
