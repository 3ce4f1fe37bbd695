//! Error taxonomy for the engine.
//!
//! Two kinds matter at the process boundary: [`Error::Corrupt`], which is
//! always fatal during recovery (the caller exits with status 2, see
//! [`crate::aof`] and [`crate::rdb`]), and [`Error::Io`], which degrades
//! gracefully on the runtime write path (surfaced upstream as HTTP 503).

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the durability engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A CRC mismatch, short read, or truncated record was found while
    /// loading an AOF or RDB file. Fatal: the process must refuse to start.
    #[error("corrupt persistence file {path}: {reason}")]
    Corrupt {
        /// File that failed verification.
        path: PathBuf,
        /// Human-readable description of what failed.
        reason: String,
    },

    /// A `write`/`fsync`/`rename` call failed on the runtime write path.
    #[error("io error on {path}: {source}")]
    Io {
        /// File the failing operation targeted.
        path: PathBuf,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A POSIX syscall (`fork`, `waitpid`, `sched_setaffinity`, ...) failed.
    #[cfg(unix)]
    #[error("system call failed: {0}")]
    Sys(#[from] nix::Error),

    /// Configuration could not be loaded or did not validate.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// True for errors that must abort startup with exit code 2.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Error::Corrupt { .. })
    }

    /// Wrap a plain [`std::io::Error`] with the path that produced it.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a [`Error::Corrupt`] with a path and a reason.
    #[must_use]
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
