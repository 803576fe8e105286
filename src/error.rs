//! Error taxonomy for planning and applying a sync run.
//!
//! `NotFound`, `CorruptState`, `DirectoryClash` and `InsufficientCapacity` are
//! raised before any mutation starts. `Io` can be raised at any point, including in the middle of
//! the finish sweep.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{what} not found: {name}")]
    NotFound { what: &'static str, name: String },

    #[error("Corrupt sink metadata at {path}: {message}")]
    CorruptState { path: PathBuf, message: String },

    #[error(
        "Insufficient capacity on {path}: needs {required} bytes, {available} bytes available"
    )]
    InsufficientCapacity {
        path: PathBuf,
        required: i64,
        available: u64,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read catalog {path}: {message}")]
    Catalog { path: PathBuf, message: String },

    #[error("Invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Playlists {first:?} and {second:?} would both sync into directory {dir:?}")]
    DirectoryClash {
        dir: String,
        first: String,
        second: String,
    },
}

impl SyncError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    /// True for errors raised before the engine touched the target.
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::CorruptState { .. }
                | Self::InsufficientCapacity { .. }
                | Self::Catalog { .. }
                | Self::Config { .. }
                | Self::DirectoryClash { .. }
        )
    }
}
