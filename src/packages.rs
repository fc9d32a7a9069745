//! OS package installation through apt-get or yum.
//!
//! `package_install` applies the same flags every time. Those flags are easy
//! to forget, and without them the package manager may prompt or rewrite
//! configs mid-hook.

use serde::{Deserialize, Deserializer};
use tracing::{debug, info};

use crate::command::{CommandRunner, CommandSpec};
use crate::distro::Distro;
use crate::environment::Environment;
use crate::error::Result;

/// Ordered list of OS package names.
///
/// Built from a single name or from a sequence. A single name becomes a
/// one-element list, so both shapes install the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSet(Vec<String>);

impl PackageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl From<&str> for PackageSet {
    fn from(name: &str) -> Self {
        Self(vec![name.to_string()])
    }
}

impl From<String> for PackageSet {
    fn from(name: String) -> Self {
        Self(vec![name])
    }
}

impl From<Vec<String>> for PackageSet {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl From<&[&str]> for PackageSet {
    fn from(names: &[&str]) -> Self {
        Self(names.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PackageSet {
    fn from(names: [&str; N]) -> Self {
        Self(names.iter().map(|s| (*s).to_string()).collect())
    }
}

impl<'de> Deserialize<'de> for PackageSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
            Some(OneOrMany::One(name)) => Self::from(name),
            Some(OneOrMany::Many(names)) => Self::from(names),
            None => Self::default(),
        })
    }
}

/// Build the install command for `packages` without running it.
///
/// The environment is a copy of `env`. For apt it also carries
/// `DEBIAN_FRONTEND=noninteractive` unless the caller already chose a frontend.
pub fn install_command(distro: Distro, packages: &PackageSet, env: &Environment) -> CommandSpec {
    let mut env = env.clone();
    distro.prepare_env(&mut env);
    CommandSpec::new(distro.package_manager(), &env)
        .args(distro.install_flags().iter().copied())
        .args(packages.iter())
}

/// Install OS packages. Does nothing when `packages` is empty.
pub fn package_install<R, P>(
    runner: &mut R,
    distro: Distro,
    packages: P,
    env: &Environment,
) -> Result<()>
where
    R: CommandRunner + ?Sized,
    P: Into<PackageSet>,
{
    let packages = packages.into();
    if packages.is_empty() {
        debug!("package_install called with no packages");
        return Ok(());
    }

    info!(
        "Installing {} package(s) via {}: {:?}",
        packages.len(),
        distro.package_manager(),
        packages.as_slice()
    );
    runner.run(&install_command(distro, &packages, env))
}
