//! Configuration directory layout.
//!
//! Everything dekl reads or writes lives under one directory:
//!
//! ```text
//! ~/.config/dekl-arch/
//! ├── config.yaml          # { host: <name> }
//! ├── hosts/<name>.yaml    # module selection + host hooks
//! ├── modules/<name>/      # module.yaml, dotfiles/, scripts
//! └── state.yaml           # hook history + links dekl created
//! ```

use directories::BaseDirs;
use std::path::{Path, PathBuf};

/// Environment variable that overrides the configuration directory.
pub const CONFIG_DIR_ENV: &str = "DEKL_CONFIG_DIR";

/// Resolved locations of the dekl configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
    home: PathBuf,
}

impl Layout {
    /// Build a layout rooted at an explicit directory.
    ///
    /// Relative roots are made absolute against the working directory, since
    /// symlink sources and hook script paths must not depend on it later.
    pub fn new(root: impl Into<PathBuf>, home: impl Into<PathBuf>) -> Self {
        Self {
            root: absolute(root.into()),
            home: absolute(home.into()),
        }
    }

    /// Discover the layout from the environment.
    ///
    /// Respects `$DEKL_CONFIG_DIR`, then `$HOME` (for test isolation), then
    /// falls back to `BaseDirs`.
    pub fn discover() -> Self {
        let home = home_dir();
        let root = std::env::var_os(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(".config").join("dekl-arch"));
        Self::new(root, home)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The user's home directory, used for `~` expansion in dotfile targets.
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn state_file(&self) -> PathBuf {
        self.root.join("state.yaml")
    }

    pub fn hosts_dir(&self) -> PathBuf {
        self.root.join("hosts")
    }

    pub fn host_file(&self, host: &str) -> PathBuf {
        self.hosts_dir().join(format!("{host}.yaml"))
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join("modules")
    }

    pub fn module_dir(&self, module: &str) -> PathBuf {
        self.modules_dir().join(module)
    }

    pub fn module_file(&self, module: &str) -> PathBuf {
        self.module_dir(module).join("module.yaml")
    }

    /// Source directory for a module's dotfiles.
    pub fn dotfiles_dir(&self, module: &str) -> PathBuf {
        self.module_dir(module).join("dotfiles")
    }

    /// Default target directory for `dotfiles: true`.
    pub fn xdg_config_home(&self) -> PathBuf {
        self.home.join(".config")
    }

    /// Expand a user-supplied target path.
    ///
    /// `~` and `~/...` expand to the home directory; other relative paths are
    /// taken relative to home as well.
    pub fn expand_target(&self, target: &str) -> PathBuf {
        if target == "~" {
            return self.home.clone();
        }
        if let Some(rest) = target.strip_prefix("~/") {
            return self.home.join(rest);
        }
        let path = Path::new(target);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.home.join(path)
        }
    }

    /// Names of every module directory that contains a `module.yaml`.
    pub fn available_modules(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Ok(entries) = std::fs::read_dir(self.modules_dir()) {
            for entry in entries.flatten() {
                if entry.path().join("module.yaml").is_file() {
                    names.push(entry.file_name().to_string_lossy().to_string());
                }
            }
        }
        names.sort();
        names
    }
}

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    std::path::absolute(&path).unwrap_or(path)
}

fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| BaseDirs::new().map(|d| d.home_dir().to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}
