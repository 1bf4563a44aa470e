//! `~/.tracklink/run/last_pass.json`: outcome of the daemon's latest pass.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracklink_sync::PassSummary;

use crate::error::{io_err, DaemonError};
use crate::paths::last_pass_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastPass {
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// Present when the pass completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<PassSummary>,
    /// Present when the pass was aborted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LastPass {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Write `last` atomically (`.tmp` then rename).
pub fn write_last_pass_at(home: &Path, last: &LastPass) -> Result<(), DaemonError> {
    let path = last_pass_path(home);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let json = serde_json::to_string_pretty(last)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))
}

/// `Ok(None)` when no pass has been recorded yet.
pub fn read_last_pass_at(home: &Path) -> Result<Option<LastPass>, DaemonError> {
    let path = last_pass_path(home);
    match fs::read_to_string(&path) {
        Ok(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(io_err(&path, err)),
    }
}
