//! wheelboot - command line entry point
//!
//! Thin launcher around the library: bootstrap the charm directory, then hand
//! control to the requested entry point.

use anyhow::{Context, Result};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use wheelboot::bootstrap::{Bootstrapper, Paths, Settings};
use wheelboot::cli::{Cli, Commands};
use wheelboot::command::{CommandRunner, DryRunRunner, SystemRunner};
use wheelboot::config::{LayerOptions, options_source};
use wheelboot::distro::{self, Distro};
use wheelboot::environment::Environment;
use wheelboot::restart::{DryRunRelauncher, EntryPoint, Relauncher, relauncher_for};
use wheelboot::sanity::{required_binaries, run_preflight_checks, verify_environment};
use wheelboot::BootstrapError;

/// Initialize the logger; RUST_LOG overrides the default `info` level.
/// Logs go to stderr so hook stdout stays untouched.
fn init_logger() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    init_logger();
    debug!("wheelboot starting up");

    let cli = Cli::parse_args();
    debug!("CLI arguments parsed: {:?}", cli);

    if let Err(e) = dispatch(cli) {
        error!("{:#}", e);
        eprintln!("✗ {:#}", e);
        let code = e
            .downcast_ref::<BootstrapError>()
            .map_or(1, BootstrapError::exit_code);
        std::process::exit(code);
    }
}

fn dispatch(cli: Cli) -> Result<()> {
    let paths = Paths::for_charm_dir(&cli.charm_dir).context("Failed to resolve charm directory")?;

    match &cli.command {
        Commands::Run { entry, args } => {
            let entry = EntryPoint::new(entry).with_args(args.iter().cloned());
            let mut settings = Settings::new(paths, entry)
                .options_group(&cli.options_group)
                .dry_run(cli.dry_run);
            if let Some(label) = &cli.distro {
                settings = settings.distro_label(label);
            }
            if let Some(interpreter) = &cli.interpreter {
                settings = settings.interpreter(interpreter);
            }

            if cli.dry_run {
                info!("Dry-run mode: no commands will be executed");
                run(settings, DryRunRunner::default(), DryRunRelauncher::default())
            } else {
                preflight(&settings);
                let mut relauncher = relauncher_for(cli.restart);
                run(settings, SystemRunner, relauncher.as_mut())
            }
        }
        Commands::Status => status(&cli, &paths),
    }
}

/// Bootstrap and hand off to the entry point
fn run<R: CommandRunner, L: Relauncher>(settings: Settings, runner: R, relauncher: L) -> Result<()> {
    let entry = settings.entry.path.clone();
    let mut bootstrapper = Bootstrapper::new(settings, runner, relauncher);
    let outcome = bootstrapper
        .launch()
        .with_context(|| format!("Failed to bootstrap and launch {}", entry.display()))?;
    info!("Launch outcome: {:?}", outcome);
    Ok(())
}

/// Warn about missing privileges or tools, only when an install is about to happen
fn preflight(settings: &Settings) {
    let paths = &settings.paths;
    if paths.marker.is_present() || !paths.wheelhouse.is_dir() {
        return;
    }
    let Ok(options) = LayerOptions::load(&paths.charm_dir, &settings.options_group) else {
        return;
    };
    let label = settings.distro_label.clone().unwrap_or_else(distro::get_distro);
    if let Ok(distro) = Distro::from_label(&label) {
        run_preflight_checks(
            &required_binaries(distro, options.use_venv),
            &Environment::from_process(),
        );
    }
}

/// Print the bootstrap state of the charm directory
fn status(cli: &Cli, paths: &Paths) -> Result<()> {
    let label = cli.distro.clone().unwrap_or_else(distro::get_distro);
    let options = LayerOptions::load(&paths.charm_dir, &cli.options_group)
        .context("Failed to load layer options")?;

    println!("Charm directory:  {}", paths.charm_dir.display());
    println!(
        "Options source:   {}",
        options_source(&paths.charm_dir)
            .map_or_else(|| "(defaults)".to_string(), |p| p.display().to_string())
    );
    println!(
        "Wheelhouse:       {} ({})",
        paths.wheelhouse.display(),
        if paths.wheelhouse.is_dir() { "present" } else { "absent" }
    );
    println!(
        "Bootstrapped:     {}",
        if paths.marker.is_present() { "yes" } else { "no" }
    );
    println!("Options group:    {}", cli.options_group);
    println!("  use_venv:                {}", options.use_venv);
    println!("  include_system_packages: {}", options.include_system_packages);
    println!("  packages:                {:?}", options.packages.as_slice());
    println!(
        "Venv:             {} ({})",
        paths.venv.root().display(),
        if paths.venv.exists() { "present" } else { "absent" }
    );

    match Distro::from_label(&label) {
        Ok(distro) => {
            println!("Distribution:     {} ({})", label, distro.package_manager());
            let result = verify_environment(
                &required_binaries(distro, options.use_venv),
                &Environment::from_process(),
            );
            println!("Running as root:  {}", if result.is_root { "yes" } else { "no" });
            if result.missing_binaries.is_empty() {
                println!("✓ All required tools found");
            } else {
                println!("✗ Missing tools: {}", result.missing_binaries.join(", "));
            }
        }
        Err(e) => println!("✗ {}", e),
    }

    Ok(())
}
