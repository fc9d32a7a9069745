//! Pre-flight checks for the runtime environment
//!
//! Reports whether the process has root privileges (package managers need
//! them) and which of the external tools the procedure may invoke are
//! reachable on `PATH`. Nothing here is fatal; the tools themselves fail
//! loudly if they are actually missing when called.

use crate::command::resolve_program;
use crate::distro::Distro;
use crate::environment::Environment;

/// Result of environment verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }
}

/// Tools needed on `distro`, given whether a venv will be built
pub fn required_binaries(distro: Distro, use_venv: bool) -> Vec<&'static str> {
    let mut tools = vec![distro.package_manager()];
    if distro == Distro::CentOs {
        tools.push("easy_install-3.4");
    }
    if use_venv {
        tools.push("virtualenv");
    } else {
        tools.push("pip3");
    }
    tools
}

/// Check if running as root (EUID 0)
pub fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Check which of `binaries` cannot be found on `env`'s `PATH`
pub fn verify_environment(binaries: &[&str], env: &Environment) -> SanityCheckResult {
    let missing_binaries = binaries
        .iter()
        .filter(|name| resolve_program(name, env).is_none())
        .map(|name| (*name).to_string())
        .collect();

    SanityCheckResult {
        missing_binaries,
        is_root: is_running_as_root(),
    }
}

/// Log the outcome of the checks before an install phase
pub fn run_preflight_checks(binaries: &[&str], env: &Environment) -> SanityCheckResult {
    tracing::debug!("Running pre-flight sanity checks...");
    let result = verify_environment(binaries, env);

    if !result.is_root {
        tracing::warn!("Not running as root; package installation will likely fail");
    }
    for binary in &result.missing_binaries {
        tracing::warn!("{} not found on PATH (it may be installed during bootstrap)", binary);
    }
    if result.is_ok() {
        tracing::info!("Pre-flight checks passed");
    }
    result
}
