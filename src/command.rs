//! External command execution.
//!
//! Every tool the bootstrapper invokes (apt-get, yum, virtualenv, pip, ...)
//! is described by a [`CommandSpec`] and executed through a [`CommandRunner`].
//! The runner is the seam that lets the procedure be driven for real, as a
//! dry run, or against a recorder in tests.
//!
//! # Failure Rule
//!
//! A non-zero exit is fatal: `run` returns `BootstrapError::CommandFailed` and
//! the caller propagates it. There are no retries.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::environment::Environment;
use crate::error::{BootstrapError, Result};

/// One external command invocation with its complete environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name (resolved through this command's own `PATH`) or path
    pub program: String,
    /// Arguments exactly as passed to the program
    pub args: Vec<String>,
    /// Full environment of the child; nothing is inherited implicitly
    pub env: Environment,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, env: &Environment) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: env.clone(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Program followed by its arguments, as one vector
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// Shell-like rendering for logs
    pub fn display(&self) -> String {
        self.argv().join(" ")
    }
}

/// Executes external commands on behalf of the bootstrapper.
pub trait CommandRunner {
    /// Run `cmd` to completion. Succeeds only on exit status 0.
    fn run(&mut self, cmd: &CommandSpec) -> Result<()>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &mut R {
    fn run(&mut self, cmd: &CommandSpec) -> Result<()> {
        (**self).run(cmd)
    }
}

/// Runs commands on the host, blocking until each exits.
///
/// Output goes straight to the caller's stdout/stderr so package-manager
/// progress shows up in the hook log. stdin is closed; nothing may prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&mut self, cmd: &CommandSpec) -> Result<()> {
        info!("Running: {}", cmd.display());
        if let Some(path) = cmd.env.get("PATH") {
            debug!("PATH={}", path.to_string_lossy());
        }

        // Bare names resolve against the child's PATH, not ours.
        let program = if cmd.program.contains('/') {
            PathBuf::from(&cmd.program)
        } else {
            resolve_program(&cmd.program, &cmd.env).unwrap_or_else(|| PathBuf::from(&cmd.program))
        };

        let mut command = Command::new(program);
        command
            .args(&cmd.args)
            .env_clear()
            .envs(cmd.env.iter())
            .stdin(Stdio::null());

        let status = command.status().map_err(|source| BootstrapError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;

        if status.success() {
            debug!("{} exited successfully", cmd.program);
            Ok(())
        } else {
            Err(BootstrapError::CommandFailed {
                program: cmd.program.clone(),
                status: status.code(),
            })
        }
    }
}

/// Find `program` in the directories of `env`'s `PATH`
pub fn resolve_program(program: &str, env: &Environment) -> Option<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    env.path_entries()
        .into_iter()
        .map(|dir| dir.join(program))
        .find(|candidate| {
            candidate
                .metadata()
                .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        })
}

/// Logs each command instead of running it.
#[derive(Debug, Default, Clone)]
pub struct DryRunRunner {
    /// Commands that would have been executed, in order
    pub planned: Vec<CommandSpec>,
}

impl CommandRunner for DryRunRunner {
    fn run(&mut self, cmd: &CommandSpec) -> Result<()> {
        info!("[DRY RUN] Would run: {}", cmd.display());
        self.planned.push(cmd.clone());
        Ok(())
    }
}
