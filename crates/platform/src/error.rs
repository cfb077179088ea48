//! Error types for the power measurement backends.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PowerError>;

/// Failures raised by the measurement backends and the TDP resolver.
///
/// Construction-time failures (`UnsupportedPlatform`, `SourceNotFound`,
/// `ExecutableNotFound`) mean the strategy cannot be used at all and the
/// caller should probe the next one. Failures during a sampling cycle are
/// never raised across `sample()`; they are logged and the affected
/// measurements are omitted from the result.
#[derive(Debug, Error)]
pub enum PowerError {
    /// The backend does not work on the current operating system.
    #[error("{backend} is not supported on {os}")]
    UnsupportedPlatform {
        backend: &'static str,
        os: &'static str,
    },

    /// The energy counter root directory does not exist.
    #[error("energy counter root not found at {0}")]
    SourceNotFound(PathBuf),

    /// The vendor power-logging executable could not be resolved.
    #[error("{name} executable not found on {os}")]
    ExecutableNotFound {
        name: &'static str,
        os: &'static str,
    },

    /// Reading a counter handle or a log file failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A tabular dataset or log could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}
