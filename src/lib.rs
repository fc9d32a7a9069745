//! wheelboot Library
//!
//! First-run dependency bootstrapper for charms. It installs OS packages,
//! optionally builds an isolated Python environment, installs the offline
//! wheelhouse, writes a marker and relaunches the entry point so the new
//! libraries are importable.

pub mod backup;
pub mod bootstrap;
pub mod cli;
pub mod command;
pub mod config;
pub mod distro;
pub mod environment;
pub mod error;
pub mod marker;
pub mod packages;
pub mod restart;
pub mod sanity;
pub mod venv;

// Re-export main types for convenience
pub use backup::PipBackup;
pub use bootstrap::{BootstrapStage, Bootstrapper, Outcome, Paths, Settings};
pub use command::{CommandRunner, CommandSpec, DryRunRunner, SystemRunner};
pub use config::LayerOptions;
pub use distro::{Distro, get_distro};
pub use environment::Environment;
pub use error::{BootstrapError, Result};
pub use marker::Marker;
pub use packages::{PackageSet, package_install};
pub use restart::{
    DryRunRelauncher, EntryPoint, ExecRelauncher, RelaunchTarget, Relauncher, RestartMode,
    SpawnRelauncher, reload_interpreter,
};
pub use venv::VenvLayout;
