//! One sync pass from configuration to report.
//!
//! Both the CLI `sync` command and the daemon loop go through [`run_once`].

use std::time::Duration;

use tracklink_core::{Backend, Clock, Config, Side, SystemClock};
use tracklink_remote::{ClickUpClient, JiraClient};

use crate::engine::{PassOptions, PassReport, Reconciler};
use crate::error::SyncError;
use crate::link_store::LinkStore;
use crate::mapper::FieldMapper;

/// The two configured remote backends.
pub struct Backends {
    pub tickets: JiraClient,
    pub board: ClickUpClient,
}

impl Backends {
    /// Build both HTTP clients, resolving the board's container path.
    pub fn connect(config: &Config) -> Result<Self, SyncError> {
        config.require_credentials()?;
        let timeout = Duration::from_secs(config.http_timeout_secs);
        let tickets = JiraClient::new(&config.jira, timeout);
        let board = ClickUpClient::connect(&config.clickup, timeout)?;
        Ok(Self { tickets, board })
    }

    pub fn get(&self, side: Side) -> &dyn Backend {
        match side {
            Side::Tickets => &self.tickets,
            Side::Board => &self.board,
        }
    }
}

/// Run one pass against the configured Jira and ClickUp backends.
pub fn run_once(config: &Config, options: PassOptions) -> Result<PassReport, SyncError> {
    let backends = Backends::connect(config)?;
    run_with(config, &backends.tickets, &backends.board, &SystemClock, options)
}

/// Run one pass against arbitrary backends.
///
/// Dry runs read the link store without creating it.
pub fn run_with(
    config: &Config,
    tickets: &dyn Backend,
    board: &dyn Backend,
    clock: &dyn Clock,
    options: PassOptions,
) -> Result<PassReport, SyncError> {
    let mut store = if options.dry_run {
        LinkStore::read(&config.store_path)?
    } else {
        LinkStore::open(&config.store_path)?
    };
    let mapper = FieldMapper::new(
        config.mapping.clone(),
        config.jira.name.clone(),
        config.clickup.name.clone(),
    );
    Reconciler::new(mapper, tickets, board, clock).run_pass(&mut store, options)
}
