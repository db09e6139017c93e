//! AUR helper selection and bootstrap.

use anyhow::{Context, Result, bail};

use crate::command_runner::{CommandOptions, CommandRunner};
use crate::manifest::AurHelper;
use crate::output::Output;
use crate::system::{command_exists, elevated};

/// Availability of the configured helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperStatus {
    /// The configured frontend is usable.
    Ready(AurHelper),
    /// The configured helper is missing but another one is installed.
    Substitute {
        configured: AurHelper,
        available: AurHelper,
    },
    /// The configured helper is missing and no other helper is installed.
    Missing(AurHelper),
}

/// First installed AUR helper, in order of preference.
pub fn available_helper(runner: &dyn CommandRunner) -> Option<AurHelper> {
    AurHelper::BOOTSTRAPPABLE
        .into_iter()
        .find(|h| command_exists(runner, h.as_str()))
}

pub fn helper_status(runner: &dyn CommandRunner, configured: AurHelper) -> HelperStatus {
    if configured == AurHelper::Pacman || command_exists(runner, configured.as_str()) {
        return HelperStatus::Ready(configured);
    }
    match available_helper(runner) {
        Some(available) => HelperStatus::Substitute {
            configured,
            available,
        },
        None => HelperStatus::Missing(configured),
    }
}

/// The frontend to use: the configured helper if installed, else the first
/// installed helper, else plain pacman.
pub fn effective_helper(runner: &dyn CommandRunner, configured: AurHelper) -> AurHelper {
    match helper_status(runner, configured) {
        HelperStatus::Ready(helper) => helper,
        HelperStatus::Substitute { available, .. } => available,
        HelperStatus::Missing(_) => AurHelper::Pacman,
    }
}

fn check(status: std::process::ExitStatus, what: &str) -> Result<()> {
    if !status.success() {
        bail!("{what} failed");
    }
    Ok(())
}

/// Build and install a helper from the AUR.
pub fn bootstrap(runner: &dyn CommandRunner, helper: AurHelper) -> Result<()> {
    if !AurHelper::BOOTSTRAPPABLE.contains(&helper) {
        bail!("Cannot bootstrap '{helper}'; supported helpers are paru and yay");
    }
    Output::info(format!("Bootstrapping {helper}..."));

    let (program, args) = elevated(
        "pacman",
        &["-S", "--needed", "--noconfirm", "base-devel", "git"],
    );
    let status = runner.run_status(program, &args, &CommandOptions::default())?;
    check(status, "Installing base-devel and git")?;

    let workdir = tempfile::tempdir().context("Failed to create build directory")?;
    let clone = workdir.path().join(helper.as_str());
    let url = format!("https://aur.archlinux.org/{helper}.git");
    let clone_arg = clone.to_string_lossy().into_owned();

    Output::info(format!("Cloning {url}..."));
    let status = runner.run_status(
        "git",
        &["clone", "--depth=1", url.as_str(), clone_arg.as_str()],
        &CommandOptions::default(),
    )?;
    check(status, &format!("Cloning {helper}"))?;

    Output::info(format!("Building {helper}..."));
    let status = runner.run_status(
        "makepkg",
        &["-si", "--noconfirm"],
        &CommandOptions::with_cwd(&clone),
    )?;
    check(status, &format!("Building {helper}"))?;

    if !command_exists(runner, helper.as_str()) {
        bail!("{helper} is still not on PATH after installing");
    }
    Output::success(format!("{helper} installed"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::mock::MockCommandRunner;

    #[test]
    fn test_configured_helper_ready() {
        let runner = MockCommandRunner::new();
        assert_eq!(
            helper_status(&runner, AurHelper::Yay),
            HelperStatus::Ready(AurHelper::Yay)
        );
    }

    #[test]
    fn test_substitute_helper() {
        let runner = MockCommandRunner::new().respond("which paru", 1, "");
        assert_eq!(
            helper_status(&runner, AurHelper::Paru),
            HelperStatus::Substitute {
                configured: AurHelper::Paru,
                available: AurHelper::Yay,
            }
        );
        assert_eq!(effective_helper(&runner, AurHelper::Paru), AurHelper::Yay);
    }

    #[test]
    fn test_missing_falls_back_to_pacman() {
        let runner = MockCommandRunner::new().respond("which", 1, "");
        assert_eq!(
            helper_status(&runner, AurHelper::Paru),
            HelperStatus::Missing(AurHelper::Paru)
        );
        assert_eq!(effective_helper(&runner, AurHelper::Paru), AurHelper::Pacman);
        // pacman never needs a lookup.
        assert_eq!(
            helper_status(&runner, AurHelper::Pacman),
            HelperStatus::Ready(AurHelper::Pacman)
        );
    }

    #[test]
    fn test_bootstrap_sequence() {
        let runner = MockCommandRunner::new();
        bootstrap(&runner, AurHelper::Paru).unwrap();

        let calls = runner.calls();
        assert!(calls[0].ends_with("pacman -S --needed --noconfirm base-devel git"));
        assert!(calls[1].starts_with("git clone --depth=1 https://aur.archlinux.org/paru.git"));
        assert_eq!(calls[2], "makepkg -si --noconfirm");
        assert_eq!(calls[3], "which paru");
    }

    #[test]
    fn test_bootstrap_stops_on_failed_clone() {
        let runner = MockCommandRunner::new().respond("git clone", 128, "");
        let err = bootstrap(&runner, AurHelper::Yay).unwrap_err();
        assert!(err.to_string().contains("Cloning yay"));
        assert!(!runner.calls().iter().any(|c| c.starts_with("makepkg")));
    }

    #[test]
    fn test_bootstrap_rejects_pacman() {
        let runner = MockCommandRunner::new();
        assert!(bootstrap(&runner, AurHelper::Pacman).is_err());
        assert!(runner.calls().is_empty());
    }
}
