//! Size-based rotation of the daemon log file.
//!
//! `tracklink.log` is shifted to `tracklink.log.1` once it reaches
//! [`MAX_LOG_BYTES`]; older copies move up by one and anything past
//! [`MAX_ROTATED_FILES`] is deleted. Rotation runs between passes.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 10 MiB.
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

pub const MAX_ROTATED_FILES: usize = 5;

/// Rotate `log_path` when it holds at least `max_bytes`.
///
/// Returns `Ok(false)` when the file is smaller or does not exist.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    if size < max_bytes {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }
    for n in (1..max_files).rev() {
        let from = numbered_path(log_path, n);
        if from.exists() {
            fs::rename(&from, numbered_path(log_path, n + 1))?;
        }
    }
    fs::rename(log_path, numbered_path(log_path, 1))?;

    // Writers reopen the path per event, so an empty file is enough.
    fs::File::create(log_path)?;
    Ok(true)
}

/// Rotate `~/.tracklink/logs/tracklink.log` under `home`, logging failures.
pub fn rotate_log(home: &Path) {
    let path = crate::paths::log_path(home);
    match rotate_if_needed(&path, MAX_LOG_BYTES, MAX_ROTATED_FILES) {
        Ok(true) => tracing::info!(path = %path.display(), "log file rotated"),
        Ok(false) => {}
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "log rotation failed"),
    }
}

/// `tracklink.log` → `tracklink.log.<n>`.
fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(crate::paths::LOG_FILE);
    base.with_file_name(format!("{name}.{n}"))
}
