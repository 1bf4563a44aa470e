//! `tracklink inspect <tickets|board> <id>`

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use tracklink_core::{config, ItemId, Side};
use tracklink_sync::{pipeline::Backends, LinkStore};

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Which backend to ask: tickets (jira) or board (clickup).
    pub side: Side,

    /// Issue key or task id.
    pub id: String,
}

impl InspectArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let config = config::load(config_path).context("failed to load config")?;
        let backends = Backends::connect(&config).context("failed to connect to backends")?;
        let id = ItemId::from(self.id);

        let item = backends
            .get(self.side)
            .get(&id)
            .with_context(|| format!("failed to fetch {} {id}", self.side))?;
        let store = LinkStore::read(&config.store_path)
            .with_context(|| format!("failed to read {}", config.store_path.display()))?;
        let link = store.find(self.side, &id);

        println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "item": item, "link": link }))
                .context("failed to serialize item")?
        );
        Ok(())
    }
}
