//! `tracklink daemon`: sync forever.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;

use tracklink_core::config;
use tracklink_daemon::{start_blocking, DaemonOptions};

#[derive(Args, Debug)]
pub struct DaemonArgs {
    /// Minutes between passes (defaults to `interval_minutes` from the config).
    #[arg(long, value_name = "N")]
    pub minutes: Option<u64>,

    /// Log to ~/.tracklink/logs/tracklink.log instead of stderr.
    #[arg(long)]
    pub log_file: bool,
}

impl DaemonArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let home = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load(config_path).context("failed to load config")?;
        config
            .require_credentials()
            .context("daemon needs credentials for both backends")?;

        let minutes = self.minutes.unwrap_or(config.interval_minutes);
        if minutes == 0 {
            bail!("--minutes must be at least 1");
        }

        start_blocking(DaemonOptions {
            home,
            config,
            interval: Duration::from_secs(minutes * 60),
            log_to_file: self.log_file,
        })
        .context("daemon exited with error")
    }
}
