//! Distribution detection and package-manager dialect dispatch.
//!
//! Only two families are recognized. The label comes from the `NAME=` field of
//! `/etc/os-release` ("Ubuntu", "CentOS Linux", ...) and is matched by substring.

use std::fs;
use std::path::Path;
use strum::{Display, EnumIter, EnumString};
use tracing::debug;

use crate::environment::Environment;
use crate::error::{BootstrapError, Result};

/// Default location of the OS identification file
pub const OS_RELEASE: &str = "/etc/os-release";

/// Recognized distribution families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
pub enum Distro {
    #[strum(serialize = "Ubuntu")]
    Ubuntu,
    #[strum(serialize = "CentOS")]
    CentOs,
}

impl Distro {
    /// Classify a distribution label.
    ///
    /// Matching is by substring so "Ubuntu" and "CentOS Linux" both resolve.
    pub fn from_label(label: &str) -> Result<Self> {
        if label.contains("Ubuntu") {
            Ok(Self::Ubuntu)
        } else if label.contains("CentOS") {
            Ok(Self::CentOs)
        } else {
            Err(BootstrapError::UnsupportedDistribution(label.to_string()))
        }
    }

    /// Package manager executable
    pub const fn package_manager(self) -> &'static str {
        match self {
            Self::Ubuntu => "apt-get",
            Self::CentOs => "yum",
        }
    }

    /// Flags placed before the package names, ending with the `install` verb
    pub const fn install_flags(self) -> &'static [&'static str] {
        match self {
            Self::Ubuntu => &[
                "--option=Dpkg::Options::=--force-confold",
                "--assume-yes",
                "install",
            ],
            Self::CentOs => &["--assumeyes", "--debuglevel=1", "install"],
        }
    }

    /// Add the variables this package manager needs to stay non-interactive
    pub fn prepare_env(self, env: &mut Environment) {
        if self == Self::Ubuntu {
            env.set_default("DEBIAN_FRONTEND", "noninteractive");
        }
    }

    /// OS packages that give the system interpreter pip and YAML support
    pub const fn wheelhouse_prerequisites(self) -> &'static [&'static str] {
        match self {
            Self::Ubuntu => &["python3-pip", "python3-yaml"],
            Self::CentOs => &["python34-PyYAML"],
        }
    }
}

/// Distribution label of the running host, or an empty string when unknown
pub fn get_distro() -> String {
    distro_label(Path::new(OS_RELEASE)).unwrap_or_default()
}

/// Read the distribution label from an os-release style file
pub fn distro_label(os_release: &Path) -> Option<String> {
    let content = match fs::read_to_string(os_release) {
        Ok(content) => content,
        Err(e) => {
            debug!("Cannot read {}: {}", os_release.display(), e);
            return None;
        }
    };
    parse_os_release_name(&content)
}

/// Extract the `NAME=` value from os-release content
pub fn parse_os_release_name(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.trim()
            .strip_prefix("NAME=")
            .map(|name| name.trim().trim_matches('"').trim_matches('\'').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use strum::IntoEnumIterator;

    #[test]
    fn test_from_label_dispatch() {
        assert_eq!(Distro::from_label("Ubuntu").unwrap(), Distro::Ubuntu);
        assert_eq!(Distro::from_label("CentOS Linux").unwrap(), Distro::CentOs);
        assert!(matches!(
            Distro::from_label("Debian GNU/Linux"),
            Err(BootstrapError::UnsupportedDistribution(_))
        ));
        assert!(Distro::from_label("").is_err());
    }

    #[test]
    fn test_label_matching_is_case_sensitive() {
        assert!(Distro::from_label("ubuntu").is_err());
    }

    #[test]
    fn test_display_roundtrip() {
        for distro in Distro::iter() {
            let parsed: Distro = distro.to_string().parse().unwrap();
            assert_eq!(parsed, distro);
            assert_eq!(Distro::from_label(&distro.to_string()).unwrap(), distro);
        }
    }

    #[test]
    fn test_parse_os_release_name() {
        let ubuntu = "PRETTY_NAME=\"Ubuntu 22.04.3 LTS\"\nNAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\n";
        assert_eq!(parse_os_release_name(ubuntu).as_deref(), Some("Ubuntu"));

        let centos = "NAME=\"CentOS Linux\"\nVERSION=\"7 (Core)\"\n";
        assert_eq!(parse_os_release_name(centos).as_deref(), Some("CentOS Linux"));

        assert_eq!(parse_os_release_name("ID=arch\n"), None);
    }

    #[test]
    fn test_distro_label_missing_file() {
        assert_eq!(distro_label(Path::new("/nonexistent/os-release")), None);
    }

    #[test]
    fn test_apt_flags_and_env() {
        assert_eq!(Distro::Ubuntu.package_manager(), "apt-get");
        assert_eq!(
            Distro::Ubuntu.install_flags(),
            &["--option=Dpkg::Options::=--force-confold", "--assume-yes", "install"]
        );

        let mut env = Environment::new();
        Distro::Ubuntu.prepare_env(&mut env);
        assert_eq!(env.get("DEBIAN_FRONTEND"), Some(OsStr::new("noninteractive")));
    }

    #[test]
    fn test_yum_flags_leave_env_untouched() {
        assert_eq!(Distro::CentOs.package_manager(), "yum");
        assert_eq!(
            Distro::CentOs.install_flags(),
            &["--assumeyes", "--debuglevel=1", "install"]
        );

        let mut env = Environment::new();
        Distro::CentOs.prepare_env(&mut env);
        assert!(env.is_empty());
    }
}
