//! End-to-end reconciliation scenarios over two in-memory backends.

use std::path::PathBuf;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use tracklink_core::{FixedClock, Item, ItemId, Link, MappingConfig, Side};
use tracklink_sync::{
    memory::MemoryBackend, FieldMapper, ItemOutcome, LinkStore, PassOptions, PassReport,
    Reconciler, SyncError,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

fn ticket(id: &str, status: &str, updated: DateTime<Utc>) -> Item {
    Item {
        side: Side::Tickets,
        id: ItemId::from(id),
        title: format!("Ticket {id}"),
        description: Some("from jira".to_string()),
        status: status.to_string(),
        priority: Some("High".to_string()),
        due_date: None,
        last_updated: updated,
        container_name: "RES".to_string(),
    }
}

fn task(id: &str, status: &str, updated: DateTime<Utc>) -> Item {
    Item {
        side: Side::Board,
        id: ItemId::from(id),
        title: format!("Task {id}"),
        description: None,
        status: status.to_string(),
        priority: Some("3".to_string()),
        due_date: None,
        last_updated: updated,
        container_name: "Sprint Backlog".to_string(),
    }
}

fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct World {
    _dir: TempDir,
    store_path: PathBuf,
    tickets: MemoryBackend,
    board: MemoryBackend,
}

impl World {
    /// Backends stamp writes at `touched_at`.
    fn new(touched_at: DateTime<Utc>) -> Self {
        init_logs();
        let dir = TempDir::new().expect("tempdir");
        let store_path = dir.path().join("links.json");
        Self {
            _dir: dir,
            store_path,
            tickets: MemoryBackend::new(Side::Tickets, "RES", "RES").with_touched_at(touched_at),
            board: MemoryBackend::new(Side::Board, "cu", "Other").with_touched_at(touched_at),
        }
    }

    fn store_with(&self, links: &[Link]) -> LinkStore {
        let mut store = LinkStore::open(&self.store_path).expect("open store");
        for link in links {
            store.upsert(link.clone());
        }
        store.persist().expect("persist");
        store
    }

    fn reload(&self) -> LinkStore {
        LinkStore::read(&self.store_path).expect("reload store")
    }

    fn pass(&self, store: &mut LinkStore, now: DateTime<Utc>, dry_run: bool) -> PassReport {
        self.try_pass(store, now, dry_run).expect("pass")
    }

    fn try_pass(
        &self,
        store: &mut LinkStore,
        now: DateTime<Utc>,
        dry_run: bool,
    ) -> Result<PassReport, SyncError> {
        let mapper = FieldMapper::new(MappingConfig::default(), "JIRA", "ClickUp");
        let clock = FixedClock(now);
        Reconciler::new(mapper, &self.tickets, &self.board, &clock)
            .run_pass(store, PassOptions { dry_run })
    }

    fn writes(&self) -> usize {
        self.tickets.calls().len() + self.board.calls().len()
    }
}

fn link(ticket: &str, board: &str, synced: DateTime<Utc>) -> Link {
    Link::new(ItemId::from(ticket), ItemId::from(board), synced)
}

fn synced_at(store: &LinkStore, ticket: &str) -> DateTime<Utc> {
    store
        .find_by_ticket(&ItemId::from(ticket))
        .expect("link present")
        .last_synced
}

// ---------------------------------------------------------------------------
// 1. Creation
// ---------------------------------------------------------------------------

#[test]
fn unlinked_ticket_gets_board_counterpart_and_link() {
    let world = World::new(at(9));
    world.tickets.insert(ticket("RES-100", "DONE", at(8)));
    let mut store = world.store_with(&[]);

    let report = world.pass(&mut store, at(9), false);

    assert_eq!(
        report.outcomes,
        vec![ItemOutcome::Created {
            side: Side::Tickets,
            id: ItemId::from("RES-100"),
            counterpart: ItemId::from("cu-1"),
        }]
    );
    let created = world.board.item("cu-1").expect("created task");
    assert_eq!(created.title, "RES-100 - Ticket RES-100");
    assert_eq!(created.status, "CLOSED");
    assert_eq!(created.priority.as_deref(), Some("2"));

    let on_disk = world.reload();
    assert_eq!(on_disk.links(), &[link("RES-100", "cu-1", at(9))]);
}

#[test]
fn unlinked_task_gets_ticket_counterpart_with_label() {
    let world = World::new(at(9));
    world.board.insert(task("cu-x", "review", at(8)));
    let mut store = world.store_with(&[]);

    world.pass(&mut store, at(9), false);

    let created = world.tickets.item("RES-1").expect("created ticket");
    assert_eq!(created.title, "ClickUp - Task cu-x");
    assert_eq!(created.status, "REVIEW");
    assert_eq!(created.priority.as_deref(), Some("Medium"));
    assert!(matches!(
        world.tickets.calls().first(),
        Some(tracklink_sync::memory::Call::Create { fields, .. })
            if fields.labels == vec!["Sprint_Backlog".to_string()]
    ));
    assert_eq!(synced_at(&world.reload(), "RES-1"), at(9));
}

#[test]
fn failed_create_records_no_link_and_continues() {
    let world = World::new(at(9));
    world.tickets.insert(ticket("RES-100", "TO DO", at(8)));
    world.board.insert(task("cu-x", "open", at(8)));
    world.board.fail_creates(true);
    let mut store = world.store_with(&[]);

    let report = world.pass(&mut store, at(9), false);

    assert!(matches!(report.outcomes[0], ItemOutcome::Failed { .. }));
    assert!(matches!(report.outcomes[1], ItemOutcome::Created { .. }));
    let on_disk = world.reload();
    assert!(on_disk.find_by_ticket(&ItemId::from("RES-100")).is_none());
    assert!(on_disk.find_by_board(&ItemId::from("cu-x")).is_some());
}

// ---------------------------------------------------------------------------
// 2. Idempotence and the 1:1 invariant
// ---------------------------------------------------------------------------

#[test]
fn second_pass_makes_no_remote_writes() {
    let world = World::new(at(9) + Duration::minutes(1));
    world.tickets.insert(ticket("RES-100", "TO DO", at(8)));
    world.tickets.insert(ticket("RES-101", "IN PROGRESS", at(8)));
    world.board.insert(task("cu-x", "open", at(8)));
    let mut store = world.store_with(&[]);

    let first = world.pass(&mut store, at(9), false);
    assert_eq!(first.summary().created, 3);
    world.tickets.clear_calls();
    world.board.clear_calls();

    // Created items carry an update time just after the first pass started.
    let second = world.pass(&mut store, at(10), false);
    assert_eq!(world.writes(), 0, "second pass wrote: {:?}", second.outcomes);
    assert_eq!(second.summary().created, 0);
    assert_eq!(second.summary().propagated, 0);

    let third = world.pass(&mut store, at(11), false);
    assert_eq!(world.writes(), 0);
    assert_eq!(third.summary().current, third.outcomes.len());
}

#[test]
fn unmapped_statuses_survive_a_second_pass() {
    let world = World::new(at(9) + Duration::minutes(1));
    world.tickets.insert(ticket("RES-100", "BACKLOG", at(8)));
    world.board.insert(task("cu-x", "blocked", at(8)));
    let mut store = world.store_with(&[]);

    let first = world.pass(&mut store, at(9), false);
    assert_eq!(first.summary().created, 2);
    assert_eq!(world.board.item("cu-1").unwrap().status, "OPEN");
    assert_eq!(world.tickets.item("RES-1").unwrap().status, "TO DO");
    world.tickets.clear_calls();
    world.board.clear_calls();

    let second = world.pass(&mut store, at(10), false);

    assert_eq!(world.writes(), 0, "second pass wrote: {:?}", second.outcomes);
    assert_eq!(second.summary().refreshed, 2);
    assert_eq!(world.tickets.item("RES-100").unwrap().status, "BACKLOG");
    assert_eq!(world.board.item("cu-x").unwrap().status, "blocked");
    assert_eq!(synced_at(&world.reload(), "RES-100"), at(10));

    let third = world.pass(&mut store, at(11), false);
    assert_eq!(world.writes(), 0);
    assert_eq!(third.summary().current, third.outcomes.len());
}

#[test]
fn every_id_appears_in_at_most_one_link() {
    let world = World::new(at(9));
    for n in 100..105 {
        world.tickets.insert(ticket(&format!("RES-{n}"), "TO DO", at(8)));
    }
    for n in 0..3 {
        world.board.insert(task(&format!("cu-x{n}"), "open", at(8)));
    }
    let mut store = world.store_with(&[]);
    world.pass(&mut store, at(9), false);
    world.pass(&mut store, at(10), false);

    let on_disk = world.reload();
    assert_eq!(on_disk.len(), 8);
    let mut tickets: Vec<_> = on_disk.links().iter().map(|l| l.ticket_id.clone()).collect();
    let mut boards: Vec<_> = on_disk.links().iter().map(|l| l.board_id.clone()).collect();
    tickets.sort();
    tickets.dedup();
    boards.sort();
    boards.dedup();
    assert_eq!(tickets.len(), 8);
    assert_eq!(boards.len(), 8);
}

// ---------------------------------------------------------------------------
// 3. Propagation, no-op, orphan
// ---------------------------------------------------------------------------

#[test]
fn changed_ticket_status_propagates_to_task() {
    let world = World::new(at(10));
    world.tickets.insert(ticket("RES-5", "DONE", at(9)));
    world.board.insert(task("cu-7", "in progress", at(7)));
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(8))]);

    let report = world.pass(&mut store, at(10), false);

    assert_eq!(
        report.outcomes[0],
        ItemOutcome::Propagated {
            side: Side::Tickets,
            id: ItemId::from("RES-5"),
            counterpart: ItemId::from("cu-7"),
            from: "in progress".to_string(),
            to: "CLOSED".to_string(),
        }
    );
    assert!(matches!(report.outcomes[1], ItemOutcome::Current { .. }));
    assert_eq!(
        world.board.status_changes(),
        vec![(ItemId::from("cu-7"), "CLOSED".to_string())]
    );
    assert!(world.tickets.status_changes().is_empty());
    assert_eq!(synced_at(&world.reload(), "RES-5"), at(10));
}

#[test]
fn unchanged_pair_is_left_alone() {
    let world = World::new(at(11));
    world.tickets.insert(ticket("RES-5", "DONE", at(9)));
    world.board.insert(task("cu-7", "open", at(9)));
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(10))]);

    let report = world.pass(&mut store, at(11), false);

    assert_eq!(report.summary().current, 2);
    assert_eq!(world.writes(), 0);
    assert_eq!(synced_at(&world.reload(), "RES-5"), at(10));
}

#[test]
fn equal_statuses_differing_in_case_only_refresh_the_watermark() {
    let world = World::new(at(10));
    world.tickets.insert(ticket("RES-5", "Done", at(9)));
    world.board.insert(task("cu-7", "closed", at(7)));
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(8))]);

    let report = world.pass(&mut store, at(10), false);

    assert!(matches!(report.outcomes[0], ItemOutcome::Refreshed { .. }));
    assert_eq!(world.writes(), 0);
    assert_eq!(synced_at(&world.reload(), "RES-5"), at(10));
}

#[test]
fn missing_counterpart_is_reported_not_recreated() {
    let world = World::new(at(10));
    world.tickets.insert(ticket("RES-5", "DONE", at(9)));
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(8))]);

    let report = world.pass(&mut store, at(10), false);

    assert_eq!(
        report.outcomes,
        vec![ItemOutcome::Orphaned {
            side: Side::Tickets,
            id: ItemId::from("RES-5"),
            counterpart: ItemId::from("cu-7"),
        }]
    );
    assert_eq!(world.writes(), 0);
    assert_eq!(world.reload().links(), &[link("RES-5", "cu-7", at(8))]);
}

// ---------------------------------------------------------------------------
// 4. Remote failures
// ---------------------------------------------------------------------------

#[test]
fn rejected_transition_still_advances_watermark() {
    let world = World::new(at(10));
    world.tickets.insert(ticket("RES-5", "TO DO", at(7)));
    world.board.insert(task("cu-7", "closed", at(9)));
    world.tickets.reject_status_changes_for("RES-5");
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(8))]);

    let report = world.pass(&mut store, at(10), false);

    assert!(matches!(
        &report.outcomes[1],
        ItemOutcome::Rejected { to, .. } if to == "DONE"
    ));
    assert_eq!(synced_at(&world.reload(), "RES-5"), at(10));

    let next = world.pass(&mut store, at(11), false);
    assert_eq!(next.summary().current, 2, "rejection is not retried");
}

#[test]
fn failed_transition_leaves_link_and_continues() {
    let world = World::new(at(10));
    world.tickets.insert(ticket("RES-5", "TO DO", at(7)));
    world.board.insert(task("cu-7", "closed", at(9)));
    world.board.insert(task("cu-8", "open", at(9)));
    world.tickets.fail_status_changes_for("RES-5");
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(8))]);

    let report = world.pass(&mut store, at(10), false);

    assert!(matches!(report.outcomes[1], ItemOutcome::Failed { .. }));
    assert!(matches!(report.outcomes[2], ItemOutcome::Created { .. }));
    assert_eq!(report.failed(), 1);
    assert_eq!(synced_at(&world.reload(), "RES-5"), at(8));
}

#[test]
fn snapshot_failure_aborts_before_any_write() {
    let world = World::new(at(10));
    world.tickets.insert(ticket("RES-5", "TO DO", at(7)));
    world.board.fail_fetch(true);
    let mut store = world.store_with(&[]);

    let err = world.try_pass(&mut store, at(10), false).unwrap_err();

    assert!(matches!(err, SyncError::Snapshot { side: Side::Board, .. }));
    assert_eq!(world.writes(), 0);
    assert!(world.reload().is_empty());
}

#[cfg(unix)]
#[test]
fn unwritable_store_stops_the_pass() {
    let world = World::new(at(10));
    world.tickets.insert(ticket("RES-5", "TO DO", at(7)));
    world.tickets.insert(ticket("RES-6", "TO DO", at(7)));
    let blocker = world._dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").expect("write blocker");
    let mut store = LinkStore::empty(&blocker.join("links.json"));

    let err = world.try_pass(&mut store, at(10), false).unwrap_err();

    assert!(matches!(err, SyncError::StorageUnavailable { .. }));
    assert_eq!(world.board.creates(), 1, "pass stops at the first failed persist");
}

// ---------------------------------------------------------------------------
// 5. Conflicts and dry runs
// ---------------------------------------------------------------------------

#[test]
fn pair_changed_on_both_sides_takes_the_board_status() {
    let world = World::new(at(10) + Duration::seconds(1));
    world.tickets.insert(ticket("RES-5", "IN PROGRESS", at(9)));
    world.board.insert(task("cu-7", "review", at(9)));
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(8))]);

    let report = world.pass(&mut store, at(10), false);

    assert!(matches!(report.outcomes[0], ItemOutcome::Propagated { .. }));
    assert!(matches!(
        &report.outcomes[1],
        ItemOutcome::Propagated { to, .. } if to == "REVIEW"
    ));
    assert_eq!(world.board.item("cu-7").unwrap().status, "review");
    assert_eq!(world.tickets.item("RES-5").unwrap().status, "REVIEW");
    assert_eq!(
        world.board.status_changes(),
        vec![
            (ItemId::from("cu-7"), "IN PROGRESS".to_string()),
            (ItemId::from("cu-7"), "review".to_string()),
        ]
    );
}

#[test]
fn failed_restore_on_a_pair_changed_on_both_sides_keeps_the_link() {
    let world = World::new(at(10) + Duration::seconds(1));
    world.tickets.insert(ticket("RES-5", "IN PROGRESS", at(9)));
    world.board.insert(task("cu-7", "review", at(9)));
    world.board.fail_status_change_to("cu-7", "review");
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(8))]);

    let report = world.pass(&mut store, at(10), false);

    assert!(matches!(report.outcomes[0], ItemOutcome::Propagated { .. }));
    assert!(matches!(
        &report.outcomes[1],
        ItemOutcome::Failed { side: Side::Board, id, .. } if id.as_str() == "cu-7"
    ));
    assert_eq!(report.failed(), 1);
    assert_eq!(world.board.item("cu-7").unwrap().status, "IN PROGRESS");
    assert!(world.tickets.status_changes().is_empty());
    assert_eq!(
        world.reload().links(),
        &[link("RES-5", "cu-7", at(10))],
        "only the ticket's propagation touched the link"
    );
}

#[test]
fn dry_run_reports_without_writing() {
    let world = World::new(at(10));
    world.tickets.insert(ticket("RES-5", "DONE", at(9)));
    world.tickets.insert(ticket("RES-6", "TO DO", at(9)));
    world.board.insert(task("cu-7", "open", at(7)));
    let mut store = world.store_with(&[link("RES-5", "cu-7", at(8))]);
    let before = std::fs::read_to_string(&world.store_path).expect("read store");

    let report = world.pass(&mut store, at(10), true);

    assert!(report.dry_run);
    assert!(matches!(report.outcomes[0], ItemOutcome::WouldPropagate { .. }));
    assert!(matches!(report.outcomes[1], ItemOutcome::WouldCreate { .. }));
    assert_eq!(world.writes(), 0);
    assert_eq!(store.len(), 1);
    assert_eq!(synced_at(&store, "RES-5"), at(8));
    assert_eq!(
        std::fs::read_to_string(&world.store_path).expect("read store"),
        before
    );
}
