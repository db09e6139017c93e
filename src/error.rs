//! Error taxonomy for the convergence engine.
//!
//! Command handlers work in `anyhow::Result`; the core components return
//! `DeklError` so callers (and tests) can tell a configuration problem from a
//! dotfile conflict or a failed hook.

use std::path::PathBuf;
use thiserror::Error;

use crate::hooks::HookId;

#[derive(Error, Debug)]
pub enum DeklError {
    #[error("No host configured. Run 'dekl init' first.")]
    NoHostConfigured,

    #[error("Host config not found: {path}")]
    HostNotFound { path: PathBuf },

    #[error("Module not found: {name}")]
    ModuleNotFound { name: String },

    #[error("Invalid config in {path}: {message}")]
    InvalidConfig { path: PathBuf, message: String },

    #[error("Dotfile conflict: {} claimed by '{first}' and '{second}'", target.display())]
    DotfileConflict {
        target: PathBuf,
        first: String,
        second: String,
    },

    #[error("Hook {id} failed: {reason}")]
    HookFailed { id: HookId, reason: String },

    #[error("Unknown hook: {name}")]
    UnknownHook { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeklError {
    /// True for the variants that abort a run before any plan is computed.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            DeklError::NoHostConfigured
                | DeklError::HostNotFound { .. }
                | DeklError::ModuleNotFound { .. }
                | DeklError::InvalidConfig { .. }
        )
    }
}

pub type DeklResult<T> = std::result::Result<T, DeklError>;
