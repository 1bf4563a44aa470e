//! Error types for tracklink-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ItemId;

/// All errors that can arise from loading or writing configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, unreadable file, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load, with file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}; run `tracklink init` first")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`, so `~/.tracklink/` cannot be located.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The file parsed but a value is unusable.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures reported by a [`crate::Backend`] implementation.
///
/// Everything except [`RemoteError::TransitionRejected`] is a plain remote
/// call failure: the sync engine logs it, skips the item and retries on the
/// next pass.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Network, TLS or timeout failure before a response arrived.
    #[error("transport error calling {url}: {message}")]
    Transport { url: String, message: String },

    /// The backend answered with a non-success HTTP status.
    #[error("HTTP {status} from {url}: {body}")]
    Http {
        url: String,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded into the expected shape.
    #[error("could not decode response from {url}: {message}")]
    Decode { url: String, message: String },

    /// A named resource (item, team, space, folder, list) does not exist.
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    /// The backend refused the requested status change (workflow restriction).
    #[error("transition of {id} to '{status}' rejected: {reason}")]
    TransitionRejected {
        id: ItemId,
        status: String,
        reason: String,
    },
}

impl RemoteError {
    /// `true` for the workflow-restriction case that still advances a link's watermark.
    pub fn is_transition_rejected(&self) -> bool {
        matches!(self, RemoteError::TransitionRejected { .. })
    }
}
