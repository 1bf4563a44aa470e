//! `tracklink init [--force]`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;

use tracklink_core::config::{self, write_template};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config file.
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => config::config_path().context("could not determine home directory")?,
        };

        let written = write_template(&path, self.force)
            .with_context(|| format!("failed to write {}", path.display()))?;
        if written {
            println!("✓ Wrote config template to {}", path.display());
            println!(
                "  Fill in the jira and clickup sections, or export {} / {}.",
                config::JIRA_TOKEN_ENV,
                config::CLICKUP_TOKEN_ENV
            );
        } else {
            println!(
                "config already exists at {} (use --force to overwrite)",
                path.display()
            );
        }
        Ok(())
    }
}
