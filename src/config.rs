//! Layer options: the declarative configuration a charm ships alongside its wheelhouse.
//!
//! Options live under `options.<group>` in `layer.yaml` (or `layer.json`):
//!
//! ```yaml
//! options:
//!   basic:
//!     use_venv: true
//!     include_system_packages: false
//!     packages: [libpq-dev, git]
//! ```
//!
//! Nothing is validated beyond presence; absent keys read as false/empty.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{BootstrapError, Result};
use crate::packages::PackageSet;

/// Options group read when none is given
pub const DEFAULT_OPTIONS_GROUP: &str = "basic";

/// Recognized bootstrap options
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LayerOptions {
    /// Install into an isolated environment instead of the system interpreter
    pub use_venv: bool,
    /// Let the isolated environment see system site-packages
    pub include_system_packages: bool,
    /// OS packages to install before the wheelhouse
    pub packages: PackageSet,
}

/// Top-level shape of a layer file; every other top-level key is ignored
#[derive(Debug, Default, Deserialize)]
struct LayerFile {
    #[serde(default)]
    options: Option<BTreeMap<String, Option<LayerOptions>>>,
}

impl LayerOptions {
    /// Load options for `group` from `<charm_dir>/layer.yaml`, falling back to
    /// `<charm_dir>/layer.json`. With neither present every option takes its default.
    pub fn load(charm_dir: &Path, group: &str) -> Result<Self> {
        let yaml = charm_dir.join("layer.yaml");
        if yaml.is_file() {
            return Self::load_yaml(&yaml, group);
        }

        let json = charm_dir.join("layer.json");
        if json.is_file() {
            return Self::load_json(&json, group);
        }

        debug!(
            "No layer.yaml or layer.json in {}, using default options",
            charm_dir.display()
        );
        Ok(Self::default())
    }

    /// Load options for `group` from a YAML layer file
    pub fn load_yaml(path: &Path, group: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        // An empty file parses as YAML null; treat it like an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: LayerFile = serde_yaml::from_str(&content).map_err(|source| {
            BootstrapError::Yaml {
                path: path.to_path_buf(),
                source,
            }
        })?;
        Ok(file.into_group(group, path))
    }

    /// Load options for `group` from a JSON layer file
    pub fn load_json(path: &Path, group: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let file: LayerFile =
            serde_json::from_str(&content).map_err(|source| BootstrapError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(file.into_group(group, path))
    }
}

impl LayerFile {
    fn into_group(self, group: &str, path: &Path) -> LayerOptions {
        match self.options.and_then(|mut groups| groups.remove(group)).flatten() {
            Some(options) => {
                debug!("Loaded options.{} from {}: {:?}", group, path.display(), options);
                options
            }
            None => {
                debug!("{} has no options.{}, using defaults", path.display(), group);
                LayerOptions::default()
            }
        }
    }
}

/// Where a set of options came from, for status reporting
pub fn options_source(charm_dir: &Path) -> Option<PathBuf> {
    ["layer.yaml", "layer.json"]
        .iter()
        .map(|name| charm_dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_missing_layer_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let options = LayerOptions::load(dir.path(), DEFAULT_OPTIONS_GROUP).unwrap();
        assert_eq!(options, LayerOptions::default());
        assert!(!options.use_venv);
        assert!(options.packages.is_empty());
        assert!(options_source(dir.path()).is_none());
    }

    #[test]
    fn test_yaml_options_group() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "layer.yaml",
            "includes: ['layer:basic']\n\
             options:\n  basic:\n    use_venv: true\n    include_system_packages: true\n    packages: [foo, bar]\n  other:\n    whatever: 1\n",
        );
        let options = LayerOptions::load(dir.path(), "basic").unwrap();
        assert!(options.use_venv);
        assert!(options.include_system_packages);
        assert_eq!(options.packages.as_slice(), ["foo", "bar"]);
    }

    #[test]
    fn test_missing_keys_default_to_falsy() {
        let dir = TempDir::new().unwrap();
        write(&dir, "layer.yaml", "options:\n  basic:\n    use_venv: true\n");
        let options = LayerOptions::load(dir.path(), "basic").unwrap();
        assert!(options.use_venv);
        assert!(!options.include_system_packages);
        assert!(options.packages.is_empty());
    }

    #[test]
    fn test_null_group_and_missing_group() {
        let dir = TempDir::new().unwrap();
        write(&dir, "layer.yaml", "options:\n  basic:\n");
        assert_eq!(
            LayerOptions::load(dir.path(), "basic").unwrap(),
            LayerOptions::default()
        );
        write(&dir, "layer.yaml", "options:\n");
        assert_eq!(
            LayerOptions::load(dir.path(), "basic").unwrap(),
            LayerOptions::default()
        );
        assert_eq!(
            LayerOptions::load(dir.path(), "absent").unwrap(),
            LayerOptions::default()
        );
    }

    #[test]
    fn test_single_string_package() {
        let dir = TempDir::new().unwrap();
        write(&dir, "layer.yaml", "options:\n  basic:\n    packages: git\n");
        let options = LayerOptions::load(dir.path(), "basic").unwrap();
        assert_eq!(options.packages.as_slice(), ["git"]);
    }

    #[test]
    fn test_json_fallback() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "layer.json",
            r#"{"options": {"basic": {"packages": ["foo"], "use_venv": false}}}"#,
        );
        let options = LayerOptions::load(dir.path(), "basic").unwrap();
        assert_eq!(options.packages.as_slice(), ["foo"]);
        assert_eq!(options_source(dir.path()), Some(dir.path().join("layer.json")));
    }

    #[test]
    fn test_malformed_yaml_is_an_error() {
        let dir = TempDir::new().unwrap();
        write(&dir, "layer.yaml", "options: [unclosed\n");
        let err = LayerOptions::load(dir.path(), "basic").unwrap_err();
        assert!(matches!(err, BootstrapError::Yaml { .. }));
    }

    #[test]
    fn test_empty_yaml_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "layer.yaml", "");
        assert_eq!(
            LayerOptions::load(dir.path(), "basic").unwrap(),
            LayerOptions::default()
        );
    }
}
