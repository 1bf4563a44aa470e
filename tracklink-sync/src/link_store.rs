//! Link store: the persisted table of linked ticket/task pairs.
//!
//! Persists a [`LinkStoreFile`] JSON document (pretty-printed so it can be
//! inspected by hand). Writes use the `.tmp` + rename pattern, so a crash
//! mid-write leaves the previous document intact.
//!
//! Documents written by the original `jira_key` / `clickup_id` tool are read
//! transparently and rewritten in the current format on the next persist.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use tracklink_core::{ItemId, Link, Side};

use crate::error::{storage_err, SyncError};

/// Current on-disk format version.
pub const STORE_VERSION: u32 = 1;

/// On-disk link store payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LinkStoreFile {
    pub version: u32,
    pub links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LinkStoreCompat {
    Current(LinkStoreFile),
    Legacy(LegacyStore),
}

/// `{"items": [...]}`, or `{}` as written on the legacy tool's first run.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LegacyStore {
    #[serde(default)]
    items: Vec<LegacyLink>,
}

#[derive(Debug, Deserialize)]
struct LegacyLink {
    jira_key: String,
    clickup_id: String,
    last_update: String,
}

/// In-memory link table bound to its backing file.
#[derive(Debug, Clone)]
pub struct LinkStore {
    path: PathBuf,
    links: Vec<Link>,
}

impl LinkStore {
    /// Load the store at `path`, creating an empty one on first run.
    pub fn open(path: &Path) -> Result<Self, SyncError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "initialising empty link store");
            Self::empty(path).persist()?;
        }
        Self::read(path)
    }

    /// Load the store at `path` without writing anything.
    ///
    /// A missing file yields an empty store.
    pub fn read(path: &Path) -> Result<Self, SyncError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Self::empty(path)),
            Err(err) => return Err(storage_err(path, err)),
        };
        let links = parse_links(&contents).map_err(|e| storage_err(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            links: dedup_links(links),
        })
    }

    /// An empty store that will persist to `path`.
    pub fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            links: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn find_by_ticket(&self, id: &ItemId) -> Option<&Link> {
        self.links.iter().find(|l| &l.ticket_id == id)
    }

    pub fn find_by_board(&self, id: &ItemId) -> Option<&Link> {
        self.links.iter().find(|l| &l.board_id == id)
    }

    /// Link holding `id` on `side`.
    pub fn find(&self, side: Side, id: &ItemId) -> Option<&Link> {
        match side {
            Side::Tickets => self.find_by_ticket(id),
            Side::Board => self.find_by_board(id),
        }
    }

    /// Insert `link`, replacing any link that shares either of its ids.
    ///
    /// Keeps the table 1:1: if the two ids were previously linked to
    /// different partners, both stale links are dropped.
    pub fn upsert(&mut self, link: Link) {
        let shares_id =
            |l: &Link| l.ticket_id == link.ticket_id || l.board_id == link.board_id;
        match self.links.iter().position(shares_id) {
            Some(index) => {
                self.links[index] = link.clone();
                let mut i = 0;
                self.links.retain(|l| {
                    let keep = i == index || !shares_id(l);
                    if !keep {
                        tracing::warn!(
                            ticket = %l.ticket_id,
                            board = %l.board_id,
                            "dropping link superseded by upsert"
                        );
                    }
                    i += 1;
                    keep
                });
            }
            None => self.links.push(link),
        }
    }

    /// Refresh the watermark of the link holding `id` on `side`.
    ///
    /// Returns `false` when no such link exists.
    pub fn touch(&mut self, side: Side, id: &ItemId, timestamp: DateTime<Utc>) -> bool {
        match self.links.iter_mut().find(|l| l.id_for(side) == id) {
            Some(link) => {
                link.last_synced = timestamp;
                true
            }
            None => false,
        }
    }

    /// Write the whole store atomically.
    ///
    /// Writes to `<path>.tmp` then renames to `<path>`.
    pub fn persist(&self) -> Result<(), SyncError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| storage_err(dir, e))?;
        }

        let file = LinkStoreFile {
            version: STORE_VERSION,
            links: self.links.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| storage_err(&self.path, std::io::Error::other(e)))?;
        let tmp = PathBuf::from(format!("{}.tmp", self.path.display()));
        std::fs::write(&tmp, json).map_err(|e| storage_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(storage_err(&self.path, e));
        }
        Ok(())
    }
}

fn parse_links(contents: &str) -> Result<Vec<Link>, std::io::Error> {
    let invalid = |msg: String| std::io::Error::new(ErrorKind::InvalidData, msg);
    match serde_json::from_str::<LinkStoreCompat>(contents).map_err(|e| invalid(e.to_string()))? {
        LinkStoreCompat::Current(file) => {
            if file.version > STORE_VERSION {
                return Err(invalid(format!(
                    "link store version {} is newer than supported version {STORE_VERSION}",
                    file.version
                )));
            }
            Ok(file.links)
        }
        LinkStoreCompat::Legacy(legacy) => legacy
            .items
            .into_iter()
            .map(|item| {
                let last_synced = parse_legacy_timestamp(&item.last_update).ok_or_else(|| {
                    invalid(format!(
                        "bad last_update '{}' for {}",
                        item.last_update, item.jira_key
                    ))
                })?;
                Ok(Link::new(
                    ItemId::from(item.jira_key),
                    ItemId::from(item.clickup_id),
                    last_synced,
                ))
            })
            .collect(),
    }
}

/// Legacy timestamps are naive ISO strings and are taken as UTC; offsets are
/// honoured when present.
fn parse_legacy_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Drop links whose ticket or board id was already claimed by an earlier link.
fn dedup_links(links: Vec<Link>) -> Vec<Link> {
    let mut tickets = HashSet::new();
    let mut boards = HashSet::new();
    links
        .into_iter()
        .filter(|link| {
            let fresh = !tickets.contains(&link.ticket_id) && !boards.contains(&link.board_id);
            if fresh {
                tickets.insert(link.ticket_id.clone());
                boards.insert(link.board_id.clone());
            } else {
                tracing::warn!(
                    ticket = %link.ticket_id,
                    board = %link.board_id,
                    "ignoring duplicate link in store"
                );
            }
            fresh
        })
        .collect()
}
