//! Process replacement (relaunch).
//!
//! After the wheelhouse is installed, the host entry point must start over
//! so it sees the new libraries. The same applies when it has to move into
//! the isolated environment. [`Relauncher`] abstracts how that happens:
//!
//! - [`ExecRelauncher`]: `execve` in place. Same pid, and it never returns on success.
//! - [`SpawnRelauncher`]: run the target as a child, wait, and exit with its status.
//! - [`DryRunRelauncher`]: log the target and return.

use nix::unistd::execve;
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use strum::{Display, EnumString};
use tracing::info;

use crate::environment::Environment;
use crate::error::{BootstrapError, Result};

/// The program the host was started as, plus its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub path: PathBuf,
    pub args: Vec<OsString>,
}

impl EntryPoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Entry point of the running process, taken from `argv`
    pub fn current() -> Option<Self> {
        let mut argv = std::env::args_os();
        let path = argv.next()?;
        Some(Self::new(path).with_args(argv))
    }
}

/// A fully resolved replacement: program, arguments (without argv[0]) and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchTarget {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub env: Environment,
}

impl RelaunchTarget {
    /// Run `entry` through `interpreter`: `interpreter <entry> [args...]`
    pub fn via_interpreter(interpreter: &Path, entry: &EntryPoint, env: &Environment) -> Self {
        let mut args = Vec::with_capacity(entry.args.len() + 1);
        args.push(entry.path.clone().into_os_string());
        args.extend(entry.args.iter().cloned());
        Self {
            program: interpreter.to_path_buf(),
            args,
            env: env.clone(),
        }
    }

    /// Run `entry` directly, relying on its shebang
    pub fn direct(entry: &EntryPoint, env: &Environment) -> Self {
        Self {
            program: entry.path.clone(),
            args: entry.args.clone(),
            env: env.clone(),
        }
    }

    /// `argv` as handed to the new image; argv[0] is the program itself
    pub fn argv(&self) -> Vec<&OsStr> {
        std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(OsString::as_os_str))
            .collect()
    }

    fn display(&self) -> String {
        self.argv()
            .iter()
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How the current process gets replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum RestartMode {
    /// In-place `execve`
    #[default]
    Exec,
    /// Spawn, wait, exit with the child's status
    Spawn,
}

/// Replaces the running process with a [`RelaunchTarget`].
pub trait Relauncher {
    /// Hand control to `target`. Real implementations do not return on success.
    fn relaunch(&mut self, target: &RelaunchTarget) -> Result<()>;
}

impl<R: Relauncher + ?Sized> Relauncher for &mut R {
    fn relaunch(&mut self, target: &RelaunchTarget) -> Result<()> {
        (**self).relaunch(target)
    }
}

/// Build the relauncher for `mode`
pub fn relauncher_for(mode: RestartMode) -> Box<dyn Relauncher> {
    match mode {
        RestartMode::Exec => Box::new(ExecRelauncher),
        RestartMode::Spawn => Box::new(SpawnRelauncher),
    }
}

/// Replace the process image with `execve`
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecRelauncher;

impl Relauncher for ExecRelauncher {
    fn relaunch(&mut self, target: &RelaunchTarget) -> Result<()> {
        info!("Relaunching (exec): {}", target.display());

        let program = to_cstring(target.program.as_os_str())?;
        let argv = target
            .argv()
            .into_iter()
            .map(to_cstring)
            .collect::<Result<Vec<_>>>()?;
        let envp = target
            .env
            .iter()
            .map(|(k, v)| {
                let mut pair = k.as_bytes().to_vec();
                pair.push(b'=');
                pair.extend_from_slice(v.as_bytes());
                CString::new(pair).map_err(|e| BootstrapError::relaunch(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        // execve only returns on failure.
        match execve(&program, &argv, &envp) {
            Ok(never) => match never {},
            Err(errno) => Err(BootstrapError::relaunch(format!(
                "execve {} failed: {}",
                target.program.display(),
                errno
            ))),
        }
    }
}

fn to_cstring(s: &OsStr) -> Result<CString> {
    CString::new(s.as_bytes()).map_err(|e| BootstrapError::relaunch(e.to_string()))
}

/// Run the target as a child and exit with its status
#[derive(Debug, Default, Clone, Copy)]
pub struct SpawnRelauncher;

impl SpawnRelauncher {
    /// Spawn `target`, wait for it and return the exit code the parent should use
    pub fn run_child(target: &RelaunchTarget) -> Result<i32> {
        let status = Command::new(&target.program)
            .args(&target.args)
            .env_clear()
            .envs(target.env.iter())
            .status()
            .map_err(|e| {
                BootstrapError::relaunch(format!("spawn {} failed: {}", target.program.display(), e))
            })?;

        Ok(match (status.code(), status.signal()) {
            (Some(code), _) => code,
            (None, Some(sig)) => 128 + sig,
            (None, None) => 1,
        })
    }
}

impl Relauncher for SpawnRelauncher {
    fn relaunch(&mut self, target: &RelaunchTarget) -> Result<()> {
        info!("Relaunching (spawn): {}", target.display());
        let code = Self::run_child(target)?;
        info!("Relaunched process exited with {}", code);
        std::process::exit(code);
    }
}

/// Records relaunch targets instead of acting on them
#[derive(Debug, Default, Clone)]
pub struct DryRunRelauncher {
    pub targets: Vec<RelaunchTarget>,
}

impl Relauncher for DryRunRelauncher {
    fn relaunch(&mut self, target: &RelaunchTarget) -> Result<()> {
        info!("[DRY RUN] Would relaunch: {}", target.display());
        self.targets.push(target.clone());
        Ok(())
    }
}

/// Relaunch `entry`, through `interpreter` when one is given.
pub fn reload_interpreter<R: Relauncher + ?Sized>(
    relauncher: &mut R,
    interpreter: Option<&Path>,
    entry: &EntryPoint,
    env: &Environment,
) -> Result<()> {
    let target = match interpreter {
        Some(python) => RelaunchTarget::via_interpreter(python, entry, env),
        None => RelaunchTarget::direct(entry, env),
    };
    relauncher.relaunch(&target)
}
