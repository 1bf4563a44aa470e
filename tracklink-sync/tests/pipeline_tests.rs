//! `pipeline::run_with` / `run_once` against a temp link store.

use std::path::Path;

use chrono::{TimeZone, Utc};
use tempfile::TempDir;
use tracklink_core::{
    ClickUpConfig, Config, ConfigError, FixedClock, Item, ItemId, JiraConfig, MappingConfig, Side,
};
use tracklink_sync::{memory::MemoryBackend, pipeline, LinkStore, PassOptions, SyncError};

fn config(store_path: &Path) -> Config {
    Config {
        jira: JiraConfig {
            url: "https://example.atlassian.net/".to_string(),
            email: "bot@example.com".to_string(),
            api_token: String::new(),
            project: "RES".to_string(),
            name: "JIRA".to_string(),
        },
        clickup: ClickUpConfig {
            api_token: String::new(),
            team: "Acme".to_string(),
            space: "Engineering".to_string(),
            project: "Task management".to_string(),
            list: "Other".to_string(),
            name: "ClickUp".to_string(),
        },
        mapping: MappingConfig::default(),
        store_path: store_path.to_path_buf(),
        interval_minutes: 10,
        http_timeout_secs: 60,
    }
}

fn backends() -> (MemoryBackend, MemoryBackend) {
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    let tickets = MemoryBackend::new(Side::Tickets, "RES", "RES").with_touched_at(now);
    tickets.insert(Item {
        side: Side::Tickets,
        id: ItemId::from("RES-382"),
        title: "Fix login".to_string(),
        description: None,
        status: "TO DO".to_string(),
        priority: None,
        due_date: None,
        last_updated: now,
        container_name: "RES".to_string(),
    });
    let board = MemoryBackend::new(Side::Board, "cu", "Other").with_touched_at(now);
    (tickets, board)
}

#[test]
fn first_run_creates_store_and_links() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("state").join("links.json");
    let (tickets, board) = backends();
    let clock = FixedClock(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());

    let report = pipeline::run_with(
        &config(&path),
        &tickets,
        &board,
        &clock,
        PassOptions::default(),
    )
    .expect("pass");

    assert_eq!(report.summary().created, 1);
    let store = LinkStore::read(&path).expect("read");
    assert_eq!(store.len(), 1);
    assert!(!dir.path().join("state").join("links.json.tmp").exists());
}

#[test]
fn dry_run_never_creates_the_store_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("links.json");
    let (tickets, board) = backends();
    let clock = FixedClock(Utc::now());

    let report = pipeline::run_with(
        &config(&path),
        &tickets,
        &board,
        &clock,
        PassOptions { dry_run: true },
    )
    .expect("pass");

    assert_eq!(report.summary().created, 1);
    assert!(!path.exists());
    assert_eq!(board.creates(), 0);
}

#[test]
fn legacy_store_is_upgraded_on_first_write() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("db.json");
    std::fs::write(
        &path,
        r#"{"items":[{"jira_key":"RES-1","clickup_id":"gone","last_update":"2024-01-01T00:00:00"}]}"#,
    )
    .expect("write legacy");
    let (tickets, board) = backends();
    let clock = FixedClock(Utc::now());

    pipeline::run_with(&config(&path), &tickets, &board, &clock, PassOptions::default())
        .expect("pass");

    let raw = std::fs::read_to_string(&path).expect("read");
    assert!(raw.contains("\"version\": 1"), "got: {raw}");
    assert!(raw.contains("\"ticket_id\": \"RES-1\""));
}

#[test]
fn run_once_without_credentials_fails_before_network() {
    let dir = TempDir::new().expect("tempdir");
    let err = pipeline::run_once(&config(&dir.path().join("links.json")), PassOptions::default())
        .unwrap_err();

    match err {
        SyncError::Config(ConfigError::Invalid(msg)) => {
            assert!(msg.contains("jira.api_token"));
            assert!(msg.contains("clickup.api_token"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
