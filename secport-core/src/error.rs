//! Error types for secport.
//!
//! All errors use `thiserror` for ergonomic error handling and proper error chains.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for secport operations.
pub type Result<T> = std::result::Result<T, SecportError>;

/// Main error type for secport.
#[derive(Error, Debug)]
pub enum SecportError {
    // Configuration-time errors
    #[error("Unsupported runtime '{runtime}'. Allowed runtimes: {allowed:?}")]
    UnsupportedRuntime { runtime: String, allowed: Vec<String> },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Build errors
    #[error("Build failed for {target}: {reason}")]
    BuildFailed { target: String, reason: String },

    #[error("Failed to create container from image {tag}: {reason}")]
    InstantiationFailed { tag: String, reason: String },

    #[error("VM provisioning failed for {target}: {reason}")]
    ProvisionFailed { target: String, reason: String },

    // Persistence errors
    #[error("Instructions written to {path:?} do not match the rendered output")]
    PersistenceMismatch { path: PathBuf },

    // Discovery errors
    #[error("No analyzable sources found under the given inputs")]
    NoTargets,

    // Process errors
    #[error("Failed to spawn '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Caller-initiated abort; cleanup always runs before this propagates
    #[error("Cancelled by user")]
    Cancelled,
}

impl SecportError {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}
