//! Error handling module for wheelboot
//!
//! Provides the library error type using thiserror. Every fallible step of the
//! bootstrap procedure surfaces one of these variants; nothing is retried.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the bootstrapper
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// Host OS family is neither Ubuntu nor CentOS
    #[error("Distribution not supported: {0:?}")]
    UnsupportedDistribution(String),

    /// External tool ran but exited non-zero (or was killed by a signal)
    #[error("Command `{program}` failed with {}", describe_status(.status))]
    CommandFailed {
        program: String,
        status: Option<i32>,
    },

    /// External tool could not be started at all
    #[error("Failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Layer options could not be interpreted
    #[error("Configuration error: {0}")]
    Config(String),

    /// layer.yaml parse failure
    #[error("YAML error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// layer.json parse failure
    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// IO errors (marker, backup copies, wheelhouse listing)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Replacing the process image failed
    #[error("Relaunch failed: {0}")]
    Relaunch(String),
}

/// Result type alias for bootstrap operations
pub type Result<T> = std::result::Result<T, BootstrapError>;

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit code {}", code),
        None => "termination by signal".to_string(),
    }
}

impl BootstrapError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a relaunch error
    pub fn relaunch(msg: impl Into<String>) -> Self {
        Self::Relaunch(msg.into())
    }

    /// Exit status the hosting process should terminate with.
    ///
    /// A failed external tool propagates its own status; everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed {
                status: Some(code), ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }
}
