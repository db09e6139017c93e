//! dekl: declarative Arch Linux system management.
//!
//! A host selects an ordered list of modules; each module declares packages,
//! systemd services, dotfile symlinks and lifecycle hooks. `dekl sync`
//! resolves the selection into one declared state, diffs it against the
//! machine and converges:
//!
//! - [`resolve`] folds modules into a [`resolve::DeclaredState`]
//! - [`diff`] plans package and service changes
//! - [`dotfiles`] plans symlinks
//! - [`hooks`] decides which hooks fire and records their runs
//! - [`sync`] sequences all of it against the collaborators in [`system`]

pub mod aur;
pub mod cli;
pub mod command_runner;
pub mod commands;
pub mod diff;
pub mod dotfiles;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod output;
pub mod paths;
pub mod plan;
pub mod resolve;
pub mod state;
pub mod sync;
pub mod system;

pub use cli::{Cli, Commands};
pub use error::{DeklError, DeklResult};
