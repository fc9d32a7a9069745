use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

use crate::config::DEFAULT_OPTIONS_GROUP;
use crate::restart::RestartMode;

/// wheelboot - first-run dependency bootstrapper for charms
#[derive(Parser, Debug)]
#[command(name = "wheelboot")]
#[command(about = "Install OS packages and an offline wheelhouse once, then relaunch the entry point")]
#[command(version)]
pub struct Cli {
    /// Charm directory containing `wheelhouse/` and `layer.yaml`
    #[arg(long, global = true, env = "WHEELBOOT_CHARM_DIR", default_value = ".")]
    pub charm_dir: PathBuf,

    /// Options group inside the layer file
    #[arg(long, global = true, env = "WHEELBOOT_OPTIONS_GROUP", default_value = DEFAULT_OPTIONS_GROUP)]
    pub options_group: String,

    /// Distribution label to use instead of /etc/os-release (e.g. "Ubuntu")
    #[arg(long, global = true, env = "WHEELBOOT_DISTRO")]
    pub distro: Option<String>,

    /// Interpreter the entry point is currently running under
    #[arg(long, global = true, env = "WHEELBOOT_INTERPRETER")]
    pub interpreter: Option<PathBuf>,

    /// Dry-run mode: log every command and the relaunch without executing them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// How to replace the process once bootstrapped (exec or spawn)
    #[arg(long, global = true, default_value_t = RestartMode::Exec)]
    pub restart: RestartMode,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bootstrap if needed, then hand off to the entry point
    Run {
        /// Entry point to relaunch (hook script or program)
        entry: PathBuf,

        /// Arguments forwarded to the entry point
        #[arg(last = true)]
        args: Vec<OsString>,
    },
    /// Show bootstrap state without changing anything
    Status,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
