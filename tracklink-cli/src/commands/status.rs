//! `tracklink status`: link table and last daemon pass.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use tracklink_core::{config, Link};
use tracklink_daemon::{read_last_pass_at, LastPass};
use tracklink_sync::LinkStore;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let config = config::load(config_path)
            .context("failed to load config; run `tracklink init` first")?;
        let store = LinkStore::read(&config.store_path)
            .with_context(|| format!("failed to read {}", config.store_path.display()))?;
        let last_pass = read_last_pass_at(&home).context("failed to read last pass record")?;

        if self.json {
            print_json(&store, last_pass)
        } else {
            print_table(&store, last_pass.as_ref());
            Ok(())
        }
    }
}

#[derive(Serialize)]
struct StatusJson<'a> {
    store: &'a Path,
    links: &'a [Link],
    last_pass: Option<LastPass>,
}

#[derive(Tabled)]
struct LinkRow {
    #[tabled(rename = "ticket")]
    ticket: String,
    #[tabled(rename = "board")]
    board: String,
    #[tabled(rename = "last synced")]
    last_synced: String,
}

fn print_json(store: &LinkStore, last_pass: Option<LastPass>) -> Result<()> {
    let payload = StatusJson {
        store: store.path(),
        links: store.links(),
        last_pass,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(store: &LinkStore, last_pass: Option<&LastPass>) {
    println!(
        "tracklink v{} | {} links | store {}",
        env!("CARGO_PKG_VERSION"),
        store.len(),
        store.path().display(),
    );
    println!("Last pass: {}", describe_last_pass(last_pass, Utc::now()));

    if store.is_empty() {
        println!("No links yet. Run `tracklink sync` to pair items.");
        return;
    }

    let now = Utc::now();
    let rows: Vec<LinkRow> = store
        .links()
        .iter()
        .map(|link| LinkRow {
            ticket: link.ticket_id.to_string(),
            board: link.board_id.to_string(),
            last_synced: format_age(link.last_synced, now),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}

fn describe_last_pass(last_pass: Option<&LastPass>, now: DateTime<Utc>) -> String {
    let Some(last) = last_pass else {
        return "never".bright_black().to_string();
    };
    let age = format_age(last.finished_at, now);
    match (&last.summary, &last.error) {
        (_, Some(error)) => format!("{} {age}: {error}", "FAILED".red().bold()),
        (Some(s), None) => format!(
            "{} {age} ({} created, {} propagated, {} failed)",
            "OK".green().bold(),
            s.created,
            s.propagated,
            s.failed
        ),
        (None, None) => format!("{} {age}", "OK".green().bold()),
    }
}

/// Coarse "3m ago" style age.
fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - at).num_seconds();
    match secs {
        s if s < 0 => "just now".to_string(),
        s if s < 60 => format!("{s}s ago"),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}
