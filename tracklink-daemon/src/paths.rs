use std::path::{Path, PathBuf};

use tracklink_core::config::tracklink_dir_at;

pub const LOG_FILE: &str = "tracklink.log";
pub const LAST_PASS_FILE: &str = "last_pass.json";

pub fn run_dir(home: &Path) -> PathBuf {
    tracklink_dir_at(home).join("run")
}

pub fn logs_dir(home: &Path) -> PathBuf {
    tracklink_dir_at(home).join("logs")
}

pub fn log_path(home: &Path) -> PathBuf {
    logs_dir(home).join(LOG_FILE)
}

pub fn last_pass_path(home: &Path) -> PathBuf {
    run_dir(home).join(LAST_PASS_FILE)
}
