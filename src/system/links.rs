//! Filesystem symlink adapter.

use anyhow::{Context, Result, bail};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;

use super::{LinkState, SymlinkManager};

pub struct FsLinks;

impl SymlinkManager for FsLinks {
    fn inspect(&self, target: &Path) -> Result<LinkState> {
        let meta = match fs::symlink_metadata(target) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LinkState::Absent),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to inspect {}", target.display()));
            }
        };

        let file_type = meta.file_type();
        if file_type.is_symlink() {
            let dest = fs::read_link(target)
                .with_context(|| format!("Failed to read link {}", target.display()))?;
            Ok(LinkState::Symlink(dest))
        } else if file_type.is_dir() {
            Ok(LinkState::Directory)
        } else {
            Ok(LinkState::File)
        }
    }

    fn create(&self, target: &Path, source: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        symlink(source, target).with_context(|| {
            format!(
                "Failed to link {} -> {}",
                target.display(),
                source.display()
            )
        })
    }

    fn replace(&self, target: &Path, source: &Path) -> Result<()> {
        self.remove(target)?;
        self.create(target, source)
    }

    fn remove(&self, target: &Path) -> Result<()> {
        match self.inspect(target)? {
            LinkState::Symlink(_) => fs::remove_file(target)
                .with_context(|| format!("Failed to remove {}", target.display())),
            LinkState::Absent => Ok(()),
            LinkState::File | LinkState::Directory => {
                bail!("Refusing to remove {}: not a symlink", target.display())
            }
        }
    }
}
