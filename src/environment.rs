//! Explicit environment for child processes.
//!
//! The bootstrapper never mutates its own process environment. It snapshots
//! the variables once, edits the copy (`PATH` prepends, `DEBIAN_FRONTEND`),
//! and hands that copy to every spawned command and to the relaunch.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::error::{BootstrapError, Result};

/// Owned variable map passed verbatim to child processes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

impl Environment {
    /// Empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current process environment
    pub fn from_process() -> Self {
        std::env::vars_os().collect()
    }

    pub fn get(&self, key: impl AsRef<OsStr>) -> Option<&OsStr> {
        self.vars.get(key.as_ref()).map(OsString::as_os_str)
    }

    pub fn contains(&self, key: impl AsRef<OsStr>) -> bool {
        self.vars.contains_key(key.as_ref())
    }

    pub fn set(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.insert(key.into(), value.into());
    }

    /// Set `key` only when it is not already present
    pub fn set_default(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn remove(&mut self, key: impl AsRef<OsStr>) -> Option<OsString> {
        self.vars.remove(key.as_ref())
    }

    /// Put `dir` in front of every existing `PATH` entry
    pub fn prepend_path(&mut self, dir: &Path) -> Result<()> {
        let mut entries: Vec<PathBuf> = vec![dir.to_path_buf()];
        if let Some(existing) = self.get("PATH") {
            entries.extend(std::env::split_paths(existing));
        }
        let joined = std::env::join_paths(entries).map_err(|e| {
            BootstrapError::config(format!("Cannot add {} to PATH: {}", dir.display(), e))
        })?;
        self.set("PATH", joined);
        Ok(())
    }

    /// Directories currently on `PATH`, in search order
    pub fn path_entries(&self) -> Vec<PathBuf> {
        self.get("PATH")
            .map(|p| std::env::split_paths(p).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl<K: Into<OsString>, V: Into<OsString>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
