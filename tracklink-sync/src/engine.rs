//! The reconciliation engine.
//!
//! A pass snapshots both backends, then walks every tickets item followed by
//! every board item. Each item is in exactly one of four states:
//!
//! 1. unlinked: create the counterpart and record the link
//! 2. linked, counterpart gone: warn, leave the link alone
//! 3. linked and changed since the watermark: propagate its status
//! 4. linked and unchanged: nothing to do
//!
//! Per-item remote failures are logged and recorded as outcomes; only a
//! storage failure or a failed snapshot stops the pass.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tracklink_core::{Backend, Clock, Item, ItemId, Link, Side};

use crate::error::SyncError;
use crate::link_store::LinkStore;
use crate::mapper::FieldMapper;

/// Knobs for a single pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassOptions {
    /// Compute outcomes without touching either backend or the link store.
    pub dry_run: bool,
}

/// What happened to one item during a pass.
///
/// `side` and `id` always name the item being processed; `counterpart` is
/// its linked partner on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Created {
        side: Side,
        id: ItemId,
        counterpart: ItemId,
    },
    WouldCreate {
        side: Side,
        id: ItemId,
    },
    Propagated {
        side: Side,
        id: ItemId,
        counterpart: ItemId,
        from: String,
        to: String,
    },
    WouldPropagate {
        side: Side,
        id: ItemId,
        counterpart: ItemId,
        from: String,
        to: String,
    },
    /// Changed, but the counterpart already had the mapped status.
    Refreshed {
        side: Side,
        id: ItemId,
        counterpart: ItemId,
    },
    /// The counterpart's workflow refused the transition.
    Rejected {
        side: Side,
        id: ItemId,
        counterpart: ItemId,
        to: String,
        reason: String,
    },
    Orphaned {
        side: Side,
        id: ItemId,
        counterpart: ItemId,
    },
    Current {
        side: Side,
        id: ItemId,
    },
    Failed {
        side: Side,
        id: ItemId,
        error: String,
    },
}

impl ItemOutcome {
    pub fn side(&self) -> Side {
        match self {
            Self::Created { side, .. }
            | Self::WouldCreate { side, .. }
            | Self::Propagated { side, .. }
            | Self::WouldPropagate { side, .. }
            | Self::Refreshed { side, .. }
            | Self::Rejected { side, .. }
            | Self::Orphaned { side, .. }
            | Self::Current { side, .. }
            | Self::Failed { side, .. } => *side,
        }
    }

    pub fn id(&self) -> &ItemId {
        match self {
            Self::Created { id, .. }
            | Self::WouldCreate { id, .. }
            | Self::Propagated { id, .. }
            | Self::WouldPropagate { id, .. }
            | Self::Refreshed { id, .. }
            | Self::Rejected { id, .. }
            | Self::Orphaned { id, .. }
            | Self::Current { id, .. }
            | Self::Failed { id, .. } => id,
        }
    }
}

/// Counts for one pass, small enough to persist and print.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    pub started_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub created: usize,
    pub propagated: usize,
    pub refreshed: usize,
    pub rejected: usize,
    pub orphaned: usize,
    pub failed: usize,
    pub current: usize,
}

/// Full result of [`Reconciler::run_pass`].
#[derive(Debug, Clone)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub dry_run: bool,
    /// One entry per snapshot item, in processing order.
    pub outcomes: Vec<ItemOutcome>,
}

impl PassReport {
    /// Dry-run outcomes count towards the action they stand in for.
    pub fn summary(&self) -> PassSummary {
        let mut summary = PassSummary {
            started_at: Some(self.started_at),
            dry_run: self.dry_run,
            ..PassSummary::default()
        };
        for outcome in &self.outcomes {
            match outcome {
                ItemOutcome::Created { .. } | ItemOutcome::WouldCreate { .. } => {
                    summary.created += 1
                }
                ItemOutcome::Propagated { .. } | ItemOutcome::WouldPropagate { .. } => {
                    summary.propagated += 1
                }
                ItemOutcome::Refreshed { .. } => summary.refreshed += 1,
                ItemOutcome::Rejected { .. } => summary.rejected += 1,
                ItemOutcome::Orphaned { .. } => summary.orphaned += 1,
                ItemOutcome::Failed { .. } => summary.failed += 1,
                ItemOutcome::Current { .. } => summary.current += 1,
            }
        }
        summary
    }

    pub fn failed(&self) -> usize {
        self.summary().failed
    }
}

/// One backend's items, fetched once at pass start.
struct Snapshot {
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
}

impl Snapshot {
    fn fetch(backend: &dyn Backend) -> Result<Self, SyncError> {
        let side = backend.side();
        let items = backend
            .fetch_all()
            .map_err(|source| SyncError::Snapshot { side, source })?;
        let index = items
            .iter()
            .enumerate()
            .map(|(i, item)| (item.id.clone(), i))
            .collect();
        Ok(Self { items, index })
    }

    fn get(&self, id: &ItemId) -> Option<&Item> {
        self.index.get(id).map(|&i| &self.items[i])
    }
}

/// Mutable state carried across the items of one pass.
struct PassState {
    now: DateTime<Utc>,
    dry_run: bool,
    /// Watermarks as they stood before this pass touched anything.
    baseline: HashMap<ItemId, DateTime<Utc>>,
    /// Statuses this pass has written, keyed by side and id.
    written: HashMap<(Side, ItemId), String>,
}

impl PassState {
    fn watermark(&self, link: &Link) -> DateTime<Utc> {
        self.baseline
            .get(&link.ticket_id)
            .copied()
            .unwrap_or(link.last_synced)
    }

    fn current_status<'s>(&'s self, item: &'s Item) -> &'s str {
        self.written
            .get(&(item.side, item.id.clone()))
            .map(String::as_str)
            .unwrap_or(item.status.as_str())
    }
}

/// Reconciles one tickets backend against one board backend.
pub struct Reconciler<'a> {
    mapper: FieldMapper,
    tickets: &'a dyn Backend,
    board: &'a dyn Backend,
    clock: &'a dyn Clock,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        mapper: FieldMapper,
        tickets: &'a dyn Backend,
        board: &'a dyn Backend,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            mapper,
            tickets,
            board,
            clock,
        }
    }

    fn backend(&self, side: Side) -> &'a dyn Backend {
        match side {
            Side::Tickets => self.tickets,
            Side::Board => self.board,
        }
    }

    /// Run one pass over both backends, mutating and persisting `store`.
    pub fn run_pass(
        &self,
        store: &mut LinkStore,
        options: PassOptions,
    ) -> Result<PassReport, SyncError> {
        let now = self.clock.now();
        let tickets = Snapshot::fetch(self.tickets)?;
        let board = Snapshot::fetch(self.board)?;

        tracing::info!(
            tickets = tickets.items.len(),
            board = board.items.len(),
            links = store.len(),
            dry_run = options.dry_run,
            "starting sync pass"
        );

        let mut state = PassState {
            now,
            dry_run: options.dry_run,
            baseline: store
                .links()
                .iter()
                .map(|l| (l.ticket_id.clone(), l.last_synced))
                .collect(),
            written: HashMap::new(),
        };

        let mut outcomes = Vec::with_capacity(tickets.items.len() + board.items.len());
        for item in &tickets.items {
            outcomes.push(self.reconcile_item(item, &board, store, &mut state)?);
        }
        for item in &board.items {
            outcomes.push(self.reconcile_item(item, &tickets, store, &mut state)?);
        }

        let report = PassReport {
            started_at: now,
            dry_run: options.dry_run,
            outcomes,
        };
        let summary = report.summary();
        tracing::info!(
            created = summary.created,
            propagated = summary.propagated,
            refreshed = summary.refreshed,
            rejected = summary.rejected,
            orphaned = summary.orphaned,
            failed = summary.failed,
            dry_run = options.dry_run,
            "sync pass finished"
        );
        Ok(report)
    }

    fn reconcile_item(
        &self,
        item: &Item,
        others: &Snapshot,
        store: &mut LinkStore,
        state: &mut PassState,
    ) -> Result<ItemOutcome, SyncError> {
        let side = item.side;
        let Some(link) = store.find(side, &item.id).cloned() else {
            return self.create_counterpart(item, store, state);
        };

        let counterpart_id = link.id_for(side.other()).clone();
        let Some(counterpart) = others.get(&counterpart_id) else {
            tracing::warn!(
                ticket = %link.ticket_id,
                board = %link.board_id,
                missing = %side.other(),
                "orphaned link: counterpart not found in snapshot"
            );
            return Ok(ItemOutcome::Orphaned {
                side,
                id: item.id.clone(),
                counterpart: counterpart_id,
            });
        };

        if item.last_updated <= state.watermark(&link) {
            tracing::debug!(side = %side, id = %item.id, "unchanged since last sync");
            return Ok(ItemOutcome::Current {
                side,
                id: item.id.clone(),
            });
        }

        self.propagate(item, counterpart, store, state)
    }

    fn create_counterpart(
        &self,
        item: &Item,
        store: &mut LinkStore,
        state: &mut PassState,
    ) -> Result<ItemOutcome, SyncError> {
        let side = item.side;
        let target = side.other();
        let fields = self.mapper.counterpart_fields(item);

        if state.dry_run {
            tracing::info!(
                side = %side,
                id = %item.id,
                title = %fields.title,
                status = %fields.status,
                "[dry-run] would create counterpart on {target}"
            );
            return Ok(ItemOutcome::WouldCreate {
                side,
                id: item.id.clone(),
            });
        }

        match self.backend(target).create(&fields) {
            Ok(new_id) => {
                store.upsert(Link::between(side, item.id.clone(), new_id.clone(), state.now));
                store.persist()?;
                tracing::info!(
                    side = %side,
                    id = %item.id,
                    counterpart = %new_id,
                    status = %fields.status,
                    "created counterpart on {target}"
                );
                Ok(ItemOutcome::Created {
                    side,
                    id: item.id.clone(),
                    counterpart: new_id,
                })
            }
            Err(e) => {
                tracing::error!(
                    side = %side,
                    id = %item.id,
                    error = %e,
                    "failed to create counterpart on {target}"
                );
                Ok(ItemOutcome::Failed {
                    side,
                    id: item.id.clone(),
                    error: e.to_string(),
                })
            }
        }
    }

    fn propagate(
        &self,
        item: &Item,
        counterpart: &Item,
        store: &mut LinkStore,
        state: &mut PassState,
    ) -> Result<ItemOutcome, SyncError> {
        let side = item.side;
        let target = side.other();
        let wanted = self.mapper.status_for(target, &item.status);

        // The counterpart was processed first and overwrote this item; put
        // this item's own newer status back before pushing it across.
        let overwritten = state
            .written
            .get(&(side, item.id.clone()))
            .filter(|w| !w.eq_ignore_ascii_case(&item.status))
            .cloned();
        if let Some(written) = overwritten {
            if let Err(e) = self.backend(side).set_status(&item.id, &item.status) {
                tracing::error!(
                    side = %side,
                    id = %item.id,
                    from = %written,
                    to = %item.status,
                    error = %e,
                    "failed to restore status"
                );
                return Ok(ItemOutcome::Failed {
                    side,
                    id: item.id.clone(),
                    error: e.to_string(),
                });
            }
            tracing::info!(
                side = %side,
                id = %item.id,
                from = %written,
                to = %item.status,
                "restored status changed on both sides"
            );
            state
                .written
                .insert((side, item.id.clone()), item.status.clone());
        }

        // A pair agrees when either status maps onto the other; unmapped
        // statuses only map one way.
        let current = state.current_status(counterpart).to_string();
        let agrees = wanted.eq_ignore_ascii_case(&current)
            || self
                .mapper
                .status_for(side, &current)
                .eq_ignore_ascii_case(&item.status);
        if agrees {
            if !state.dry_run {
                store.touch(side, &item.id, state.now);
                store.persist()?;
            }
            tracing::debug!(
                side = %side,
                id = %item.id,
                counterpart = %counterpart.id,
                status = %current,
                "statuses already agree"
            );
            return Ok(ItemOutcome::Refreshed {
                side,
                id: item.id.clone(),
                counterpart: counterpart.id.clone(),
            });
        }

        if state.dry_run {
            tracing::info!(
                side = %side,
                id = %item.id,
                counterpart = %counterpart.id,
                from = %current,
                to = %wanted,
                "[dry-run] would transition counterpart"
            );
            return Ok(ItemOutcome::WouldPropagate {
                side,
                id: item.id.clone(),
                counterpart: counterpart.id.clone(),
                from: current,
                to: wanted,
            });
        }

        match self.backend(target).set_status(&counterpart.id, &wanted) {
            Ok(()) => {
                state
                    .written
                    .insert((target, counterpart.id.clone()), wanted.clone());
                store.touch(side, &item.id, state.now);
                store.persist()?;
                tracing::info!(
                    side = %side,
                    id = %item.id,
                    counterpart = %counterpart.id,
                    from = %current,
                    to = %wanted,
                    "propagated status"
                );
                Ok(ItemOutcome::Propagated {
                    side,
                    id: item.id.clone(),
                    counterpart: counterpart.id.clone(),
                    from: current,
                    to: wanted,
                })
            }
            Err(e) if e.is_transition_rejected() => {
                store.touch(side, &item.id, state.now);
                store.persist()?;
                tracing::warn!(
                    side = %side,
                    id = %item.id,
                    counterpart = %counterpart.id,
                    from = %current,
                    to = %wanted,
                    error = %e,
                    "transition rejected; watermark advanced"
                );
                Ok(ItemOutcome::Rejected {
                    side,
                    id: item.id.clone(),
                    counterpart: counterpart.id.clone(),
                    to: wanted,
                    reason: e.to_string(),
                })
            }
            Err(e) => {
                tracing::error!(
                    side = %side,
                    id = %item.id,
                    counterpart = %counterpart.id,
                    from = %current,
                    to = %wanted,
                    error = %e,
                    "failed to propagate status"
                );
                Ok(ItemOutcome::Failed {
                    side,
                    id: item.id.clone(),
                    error: e.to_string(),
                })
            }
        }
    }
}
