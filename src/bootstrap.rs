//! Bootstrap procedure
//!
//! [`Bootstrapper::bootstrap`] is the whole system: a linear, fail-fast
//! sequence guarded by the marker file.
//!
//! # Stage Flow
//!
//! ```text
//! marker present?
//!   yes -> Activating -> (use_venv && not in venv) ? relaunch via venv python : no-op
//!   no  -> wheelhouse present?
//!            no  -> no-op
//!            yes -> ReadingOptions
//!                     ↓
//!                   InstallingPrerequisites
//!                     ↓
//!                   InstallingPackages
//!                     ↓
//!                   PreparingInstaller   (venv creation, or system pip backup)
//!                     ↓
//!                   UpgradingInstaller   (pip from wheelhouse only)
//!                     ↓
//!                   InstallingWheelhouse
//!                     ↓
//!                   MarkingBootstrapped  (only reachable if everything above succeeded)
//!                     ↓
//!                   Relaunching
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use strum::Display;
use tracing::{debug, info, warn};

use crate::backup::{PipBackup, SYSTEM_PIP, SYSTEM_PIP_BACKUP};
use crate::command::{CommandRunner, CommandSpec};
use crate::config::{DEFAULT_OPTIONS_GROUP, LayerOptions};
use crate::distro::{self, Distro};
use crate::environment::Environment;
use crate::error::Result;
use crate::marker::Marker;
use crate::packages::package_install;
use crate::restart::{EntryPoint, RelaunchTarget, Relauncher, reload_interpreter};
use crate::venv::{self, VenvLayout};

/// Wheelhouse directory name, relative to the charm dir
pub const WHEELHOUSE_DIR: &str = "wheelhouse";

/// Variable carrying the relaunch interpreter into the new process image
pub const INTERPRETER_ENV: &str = "WHEELBOOT_INTERPRETER";

/// Stages of a first-run bootstrap, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BootstrapStage {
    #[strum(serialize = "Reading layer options")]
    ReadingOptions,
    #[strum(serialize = "Installing interpreter prerequisites")]
    InstallingPrerequisites,
    #[strum(serialize = "Installing declared packages")]
    InstallingPackages,
    #[strum(serialize = "Preparing package installer")]
    PreparingInstaller,
    #[strum(serialize = "Upgrading package installer")]
    UpgradingInstaller,
    #[strum(serialize = "Installing wheelhouse")]
    InstallingWheelhouse,
    #[strum(serialize = "Marking bootstrapped")]
    MarkingBootstrapped,
    #[strum(serialize = "Relaunching")]
    Relaunching,
}

/// What a call to [`Bootstrapper::bootstrap`] ended with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Marker present and nothing to activate
    AlreadyBootstrapped,
    /// Marker absent and no wheelhouse to install from
    NoWheelhouse,
    /// The relauncher returned instead of replacing the process (dry runs, tests)
    Restarted {
        /// True when the install phase ran before the relaunch
        installed: bool,
        /// Interpreter used for the relaunch, if any
        interpreter: Option<PathBuf>,
    },
}

/// Filesystem locations the procedure touches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub charm_dir: PathBuf,
    pub wheelhouse: PathBuf,
    pub marker: Marker,
    pub venv: VenvLayout,
    /// System installer binary protected during non-venv installs
    pub system_pip: PathBuf,
    pub system_pip_backup: PathBuf,
}

impl Paths {
    /// Standard layout for `charm_dir`. Relative dirs are made absolute and
    /// `.`/`..` components resolved first.
    pub fn for_charm_dir(charm_dir: &Path) -> Result<Self> {
        let charm_dir = if charm_dir.is_absolute() {
            venv::normalize(charm_dir)
        } else {
            venv::normalize(&std::env::current_dir()?.join(charm_dir))
        };
        let wheelhouse = charm_dir.join(WHEELHOUSE_DIR);
        Ok(Self {
            marker: Marker::in_wheelhouse(&wheelhouse),
            venv: VenvLayout::for_charm_dir(&charm_dir),
            wheelhouse,
            charm_dir,
            system_pip: PathBuf::from(SYSTEM_PIP),
            system_pip_backup: PathBuf::from(SYSTEM_PIP_BACKUP),
        })
    }

    pub fn with_system_pip(mut self, pip: impl Into<PathBuf>, backup: impl Into<PathBuf>) -> Self {
        self.system_pip = pip.into();
        self.system_pip_backup = backup.into();
        self
    }

    /// Staged archives: non-hidden wheelhouse entries, sorted by name
    pub fn wheelhouse_archives(&self) -> Result<Vec<PathBuf>> {
        let mut archives = Vec::new();
        for entry in fs::read_dir(&self.wheelhouse)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            archives.push(entry.path());
        }
        archives.sort();
        Ok(archives)
    }
}

/// Inputs that decide how the procedure runs
#[derive(Debug, Clone)]
pub struct Settings {
    pub paths: Paths,
    /// Options group inside the layer file
    pub options_group: String,
    /// Distribution label; `None` means read `/etc/os-release`
    pub distro_label: Option<String>,
    /// Interpreter the entry point currently runs under
    pub interpreter: Option<PathBuf>,
    /// What to relaunch once done
    pub entry: EntryPoint,
    /// Log filesystem side effects (pip backup, marker) instead of performing them
    pub dry_run: bool,
}

impl Settings {
    pub fn new(paths: Paths, entry: EntryPoint) -> Self {
        Self {
            paths,
            options_group: DEFAULT_OPTIONS_GROUP.to_string(),
            distro_label: None,
            interpreter: None,
            entry,
            dry_run: false,
        }
    }

    pub fn distro_label(mut self, label: impl Into<String>) -> Self {
        self.distro_label = Some(label.into());
        self
    }

    pub fn interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    pub fn options_group(mut self, group: impl Into<String>) -> Self {
        self.options_group = group.into();
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Whether the current interpreter already lives in an isolated environment
    pub fn in_venv(&self) -> bool {
        self.interpreter
            .as_deref()
            .is_some_and(VenvLayout::contains_interpreter)
    }

    fn resolve_distro(&self) -> Result<Distro> {
        match &self.distro_label {
            Some(label) => Distro::from_label(label),
            None => Distro::from_label(&distro::get_distro()),
        }
    }
}

/// Drives the bootstrap procedure with injected command and relaunch backends
pub struct Bootstrapper<R, L> {
    settings: Settings,
    runner: R,
    relauncher: L,
    env: Environment,
}

impl<R: CommandRunner, L: Relauncher> Bootstrapper<R, L> {
    /// Bootstrapper over a snapshot of the current process environment
    pub fn new(settings: Settings, runner: R, relauncher: L) -> Self {
        Self::with_env(settings, runner, relauncher, Environment::from_process())
    }

    pub fn with_env(settings: Settings, runner: R, relauncher: L, env: Environment) -> Self {
        Self {
            settings,
            runner,
            relauncher,
            env,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Environment handed to children so far
    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn relauncher(&self) -> &L {
        &self.relauncher
    }

    /// Bootstrap, then hand control to the entry point.
    ///
    /// When bootstrap did not relaunch (already bootstrapped without a venv to
    /// enter, or nothing to install) the entry point is launched directly.
    pub fn launch(&mut self) -> Result<Outcome> {
        let outcome = self.bootstrap()?;
        match outcome {
            Outcome::Restarted { .. } => {}
            Outcome::AlreadyBootstrapped | Outcome::NoWheelhouse => {
                debug!("Handing off to {}", self.settings.entry.path.display());
                self.relauncher
                    .relaunch(&RelaunchTarget::direct(&self.settings.entry, &self.env))?;
            }
        }
        Ok(outcome)
    }

    /// Run the procedure once.
    ///
    /// On a real host a relaunch replaces the process, so `Restarted` is only
    /// ever returned by relaunchers that come back.
    pub fn bootstrap(&mut self) -> Result<Outcome> {
        if self.settings.paths.marker.is_present() {
            return self.activate();
        }

        if !self.settings.paths.wheelhouse.is_dir() {
            info!(
                "No wheelhouse at {}, nothing to bootstrap",
                self.settings.paths.wheelhouse.display()
            );
            return Ok(Outcome::NoWheelhouse);
        }

        self.install()
    }

    /// Bootstrapped branch: move into the venv if the options ask for it.
    fn activate(&mut self) -> Result<Outcome> {
        let options = self.load_options()?;
        if !options.use_venv || self.settings.in_venv() {
            debug!("Already bootstrapped, nothing to activate");
            return Ok(Outcome::AlreadyBootstrapped);
        }

        info!("Already bootstrapped, activating {}", self.settings.paths.venv.root().display());
        let venv = self.settings.paths.venv.clone();
        self.env.prepend_path(&venv.bin())?;
        self.relaunch(Some(venv.python()), false)
    }

    /// Unbootstrapped branch with a wheelhouse present.
    fn install(&mut self) -> Result<Outcome> {
        stage(BootstrapStage::ReadingOptions);
        let options = self.load_options()?;
        // Resolved before any command so an unknown distro never touches a package manager.
        let distro = self.settings.resolve_distro()?;
        info!("Bootstrapping wheelhouse on {}", distro);

        stage(BootstrapStage::InstallingPrerequisites);
        self.wheelhouse_setup_packages(distro)?;

        stage(BootstrapStage::InstallingPackages);
        package_install(&mut self.runner, distro, options.packages.clone(), &self.env)?;

        stage(BootstrapStage::PreparingInstaller);
        let venv = self.settings.paths.venv.clone();
        let (pip, backup) = if options.use_venv {
            self.setup_venv(distro)?;
            self.create_venv(&venv, options.include_system_packages)?;
            self.env.prepend_path(&venv.bin())?;
            (venv.pip().display().to_string(), None)
        } else if self.settings.dry_run {
            info!(
                "[DRY RUN] Would back up {}",
                self.settings.paths.system_pip.display()
            );
            ("pip3".to_string(), None)
        } else {
            let paths = &self.settings.paths;
            let guard = PipBackup::create(&paths.system_pip, &paths.system_pip_backup)?;
            ("pip3".to_string(), Some(guard))
        };

        stage(BootstrapStage::UpgradingInstaller);
        let wheelhouse = self.settings.paths.wheelhouse.display().to_string();
        let upgrade = CommandSpec::new(&pip, &self.env)
            .args(offline_install_args(&wheelhouse))
            .arg("pip");
        self.runner.run(&upgrade)?;

        stage(BootstrapStage::InstallingWheelhouse);
        let archives = self.settings.paths.wheelhouse_archives()?;
        if archives.is_empty() {
            warn!("Wheelhouse {} has no archives to install", wheelhouse);
        } else {
            let bulk = CommandSpec::new(&pip, &self.env)
                .args(offline_install_args(&wheelhouse))
                .args(archives.iter().map(|a| a.display().to_string()));
            self.runner.run(&bulk)?;
        }

        if let Some(guard) = backup {
            guard.restore()?;
        }

        stage(BootstrapStage::MarkingBootstrapped);
        if self.settings.dry_run {
            info!(
                "[DRY RUN] Would write marker {}",
                self.settings.paths.marker.path().display()
            );
        } else {
            self.settings.paths.marker.write()?;
        }

        let interpreter = options.use_venv.then(|| venv.python());
        self.relaunch(interpreter, true)
    }

    fn relaunch(&mut self, interpreter: Option<PathBuf>, installed: bool) -> Result<Outcome> {
        stage(BootstrapStage::Relaunching);
        // A nested invocation must see that it already runs inside the venv.
        if let Some(python) = &interpreter {
            self.env.set(INTERPRETER_ENV, python.as_os_str());
        }
        reload_interpreter(
            &mut self.relauncher,
            interpreter.as_deref(),
            &self.settings.entry,
            &self.env,
        )?;
        Ok(Outcome::Restarted {
            installed,
            interpreter,
        })
    }

    fn load_options(&self) -> Result<LayerOptions> {
        LayerOptions::load(&self.settings.paths.charm_dir, &self.settings.options_group)
    }

    /// Give the system interpreter pip and YAML support
    fn wheelhouse_setup_packages(&mut self, distro: Distro) -> Result<()> {
        package_install(
            &mut self.runner,
            distro,
            distro.wheelhouse_prerequisites(),
            &self.env,
        )?;
        if distro == Distro::CentOs {
            let easy_install = CommandSpec::new("easy_install-3.4", &self.env).arg("pip");
            self.runner.run(&easy_install)?;
        }
        Ok(())
    }

    /// Install the virtualenv tool itself
    fn setup_venv(&mut self, distro: Distro) -> Result<()> {
        match distro {
            Distro::Ubuntu => package_install(&mut self.runner, distro, "python-virtualenv", &self.env),
            Distro::CentOs => {
                let cmd = CommandSpec::new("pip3", &self.env).args(["install", "virtualenv"]);
                self.runner.run(&cmd)
            }
        }
    }

    fn create_venv(&mut self, venv: &VenvLayout, system_site_packages: bool) -> Result<()> {
        let mut cmd = CommandSpec::new("virtualenv", &self.env)
            .arg("--python=python3")
            .arg(venv.root().display().to_string());
        if system_site_packages {
            cmd = cmd.arg("--system-site-packages");
        }
        self.runner.run(&cmd)
    }
}

/// `install -U --no-index -f <wheelhouse>`: upgrade from the local archive dir only
fn offline_install_args(wheelhouse: &str) -> [String; 5] {
    [
        "install".to_string(),
        "-U".to_string(),
        "--no-index".to_string(),
        "-f".to_string(),
        wheelhouse.to_string(),
    ]
}

fn stage(stage: BootstrapStage) {
    info!("==> {}", stage);
}
