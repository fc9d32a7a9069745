//! Bootstrap marker: a sentinel file recording that the install phase finished.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::Result;

/// Marker file name inside the wheelhouse
pub const MARKER_NAME: &str = ".bootstrapped";

/// Presence flag backed by `wheelhouse/.bootstrapped`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    path: PathBuf,
}

impl Marker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Marker living inside `wheelhouse`
    pub fn in_wheelhouse(wheelhouse: &Path) -> Self {
        Self::new(wheelhouse.join(MARKER_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_present(&self) -> bool {
        self.path.exists()
    }

    /// Create the (empty) marker file. Writing an existing marker is harmless.
    pub fn write(&self) -> Result<()> {
        fs::File::create(&self.path)?;
        info!("Bootstrap marker written: {}", self.path.display());
        Ok(())
    }
}
