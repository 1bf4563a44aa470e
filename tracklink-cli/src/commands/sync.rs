//! `tracklink sync`: run one reconciliation pass.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tracklink_core::config;
use tracklink_daemon::init_tracing;
use tracklink_sync::{pipeline, ItemOutcome, PassOptions, PassReport};

#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Report what would change without writing to either backend or the link store.
    #[arg(long)]
    pub dry_run: bool,
}

impl SyncArgs {
    pub fn run(self, config_path: Option<&Path>) -> Result<()> {
        init_tracing(None);
        let config = config::load(config_path).context("failed to load config")?;
        let report = pipeline::run_once(
            &config,
            PassOptions {
                dry_run: self.dry_run,
            },
        )
        .context("sync pass failed")?;
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &PassReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let summary = report.summary();

    for outcome in &report.outcomes {
        if let Some(line) = describe(outcome) {
            println!("{prefix}{line}");
        }
    }

    let headline = format!(
        "{prefix}✓ {} created, {} propagated, {} refreshed, {} rejected, {} orphaned, {} failed, {} unchanged",
        summary.created,
        summary.propagated,
        summary.refreshed,
        summary.rejected,
        summary.orphaned,
        summary.failed,
        summary.current,
    );
    if summary.failed > 0 {
        println!("{}", headline.yellow());
    } else {
        println!("{headline}");
    }
}

/// One line per outcome worth showing; unchanged items stay quiet.
fn describe(outcome: &ItemOutcome) -> Option<String> {
    let line = match outcome {
        ItemOutcome::Created {
            side,
            id,
            counterpart,
        } => format!("  +  {side} {id} → {counterpart}"),
        ItemOutcome::WouldCreate { side, id } => format!("  +  {side} {id} → (new)"),
        ItemOutcome::Propagated {
            side,
            id,
            counterpart,
            from,
            to,
        }
        | ItemOutcome::WouldPropagate {
            side,
            id,
            counterpart,
            from,
            to,
        } => format!("  ~  {side} {id} → {counterpart}: {from} → {to}"),
        ItemOutcome::Refreshed { .. } | ItemOutcome::Current { .. } => return None,
        ItemOutcome::Rejected {
            side,
            id,
            counterpart,
            to,
            ..
        } => format!("  !  {side} {id} → {counterpart}: transition to {to} rejected"),
        ItemOutcome::Orphaned {
            side,
            id,
            counterpart,
        } => format!("  ?  {side} {id}: linked {counterpart} no longer exists"),
        ItemOutcome::Failed { side, id, error } => {
            format!("  ✗  {side} {id}: {}", error.red())
        }
    };
    Some(line)
}
