//! Isolated environment layout.
//!
//! The venv sits beside the charm directory (`<charm_dir>/../.venv`), so it
//! survives charm upgrades that replace the charm directory.

use std::path::{Component, Path, PathBuf};

/// Directory name of the isolated environment
pub const VENV_DIR_NAME: &str = ".venv";

/// Paths inside an isolated environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenvLayout {
    root: PathBuf,
}

impl VenvLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The venv belonging to `charm_dir`: `<charm_dir>/../.venv`.
    ///
    /// `charm_dir` should already be absolute so the result is too. `.` and
    /// `..` components are resolved first, so `work/charm/..` maps to
    /// `<parent of work>/.venv`.
    pub fn for_charm_dir(charm_dir: &Path) -> Self {
        let charm_dir = normalize(charm_dir);
        let parent = charm_dir.parent().unwrap_or(&charm_dir);
        Self::new(parent.join(VENV_DIR_NAME))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Executable directory, prepended to `PATH` on activation
    pub fn bin(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn python(&self) -> PathBuf {
        self.bin().join("python")
    }

    pub fn pip(&self) -> PathBuf {
        self.bin().join("pip")
    }

    pub fn exists(&self) -> bool {
        self.python().exists()
    }

    /// Whether `interpreter` already runs from an isolated environment.
    ///
    /// Any path component named `.venv` counts, which is how the host
    /// interpreter recognizes itself after a relaunch.
    pub fn contains_interpreter(interpreter: &Path) -> bool {
        interpreter
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == VENV_DIR_NAME))
    }
}

/// Resolve `.` and `..` without touching the filesystem. Symlinks are kept as
/// written; `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}
