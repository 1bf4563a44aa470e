//! Error types for tracklink-sync.

use std::path::PathBuf;

use thiserror::Error;

use tracklink_core::{ConfigError, RemoteError, Side};

/// Errors that stop a sync pass.
///
/// Per-item remote failures never surface here; the engine records them as
/// [`crate::ItemOutcome::Failed`] and moves on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The link store could not be read, initialised or written.
    #[error("link store unavailable at {path}: {source}")]
    StorageUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The pass could not take its snapshot of one backend.
    #[error("failed to fetch {side} snapshot: {source}")]
    Snapshot {
        side: Side,
        #[source]
        source: RemoteError,
    },

    /// A backend adapter could not be set up (e.g. container path not found).
    #[error("backend setup failed: {0}")]
    Remote(#[from] RemoteError),

    /// An error from the configuration layer.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience constructor for [`SyncError::StorageUnavailable`].
pub(crate) fn storage_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::StorageUnavailable {
        path: path.into(),
        source,
    }
}
