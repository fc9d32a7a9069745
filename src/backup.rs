//! Scoped backup of the system `pip` binary.
//!
//! `pip3 install -U pip` against the system interpreter rewrites `/usr/bin/pip`.
//! [`PipBackup`] copies the binary aside when it is created. It copies it back
//! when [`PipBackup::restore`] is called or when the guard drops, so a failed
//! install still leaves the original in place.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::Result;

/// System installer binary guarded during non-venv installs
pub const SYSTEM_PIP: &str = "/usr/bin/pip";
/// Where the guarded binary is saved
pub const SYSTEM_PIP_BACKUP: &str = "/usr/bin/pip.save";

/// RAII guard that restores the system pip on drop
#[derive(Debug)]
pub struct PipBackup {
    original: PathBuf,
    backup: PathBuf,
    armed: bool,
}

impl PipBackup {
    /// Copy `original` to `backup`. A missing `original` gives a guard that does nothing.
    pub fn create(original: &Path, backup: &Path) -> Result<Self> {
        let armed = if original.exists() {
            fs::copy(original, backup)?;
            info!("Saved {} to {}", original.display(), backup.display());
            true
        } else {
            debug!("{} not present, nothing to back up", original.display());
            false
        };

        Ok(Self {
            original: original.to_path_buf(),
            backup: backup.to_path_buf(),
            armed,
        })
    }

    /// Whether a copy was taken and is still pending restore
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Put the saved binary back and remove the copy
    pub fn restore(mut self) -> Result<()> {
        self.restore_inner()
    }

    fn restore_inner(&mut self) -> Result<()> {
        if !self.armed {
            return Ok(());
        }
        self.armed = false;

        if !self.backup.exists() {
            warn!("Backup {} vanished, cannot restore", self.backup.display());
            return Ok(());
        }
        fs::copy(&self.backup, &self.original)?;
        fs::remove_file(&self.backup)?;
        info!("Restored {} from {}", self.original.display(), self.backup.display());
        Ok(())
    }
}

impl Drop for PipBackup {
    fn drop(&mut self) {
        if self.armed {
            debug!("PipBackup dropped before restore, restoring now");
            if let Err(e) = self.restore_inner() {
                warn!("Failed to restore {}: {}", self.original.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("pip");
        let backup = dir.path().join("pip.save");
        fs::write(&original, "original pip").unwrap();
        (dir, original, backup)
    }

    #[test]
    fn test_restore_puts_original_back() {
        let (_dir, original, backup) = setup();
        let guard = PipBackup::create(&original, &backup).unwrap();
        assert!(guard.is_armed());
        assert!(backup.exists());

        fs::write(&original, "upgraded pip").unwrap();
        guard.restore().unwrap();

        assert_eq!(fs::read_to_string(&original).unwrap(), "original pip");
        assert!(!backup.exists());
    }

    #[test]
    fn test_drop_restores_on_failure_path() {
        let (_dir, original, backup) = setup();
        let result = (|| -> Result<()> {
            let _guard = PipBackup::create(&original, &backup)?;
            fs::write(&original, "half-upgraded pip")?;
            Err(std::io::Error::other("pip install failed").into())
        })();

        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&original).unwrap(), "original pip");
        assert!(!backup.exists());
    }

    #[test]
    fn test_missing_original_is_noop() {
        let dir = TempDir::new().unwrap();
        let original = dir.path().join("pip");
        let backup = dir.path().join("pip.save");
        let guard = PipBackup::create(&original, &backup).unwrap();
        assert!(!guard.is_armed());
        guard.restore().unwrap();
        assert!(!original.exists());
        assert!(!backup.exists());
    }

    #[test]
    fn test_preserves_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, original, backup) = setup();
        fs::set_permissions(&original, fs::Permissions::from_mode(0o755)).unwrap();
        let guard = PipBackup::create(&original, &backup).unwrap();
        fs::set_permissions(&original, fs::Permissions::from_mode(0o644)).unwrap();
        guard.restore().unwrap();
        let mode = fs::metadata(&original).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
