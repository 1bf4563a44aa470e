//! Domain types shared by the adapters and the sync engine.
//!
//! Items from both trackers are normalised into one [`Item`] shape tagged
//! with the [`Side`] they live on. Status and priority stay in the owning
//! backend's native vocabulary; translation happens in the sync crate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A backend-native item identifier (a Jira issue key, a ClickUp task id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Which of the two trackers an item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// The ticketing backend (Jira).
    Tickets,
    /// The task-board backend (ClickUp).
    Board,
}

impl Side {
    /// The opposite side, where counterparts of this side's items live.
    pub fn other(self) -> Side {
        match self {
            Side::Tickets => Side::Board,
            Side::Board => Side::Tickets,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Tickets => write!(f, "tickets"),
            Side::Board => write!(f, "board"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tickets" | "ticket" | "jira" => Ok(Side::Tickets),
            "board" | "clickup" => Ok(Side::Board),
            other => Err(format!("unknown side '{other}'; expected: tickets, board")),
        }
    }
}

// ---------------------------------------------------------------------------
// Domain structs
// ---------------------------------------------------------------------------

/// A ticket or task, normalised to a common shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub side: Side,
    pub id: ItemId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Native status token, e.g. `IN PROGRESS` on Jira, `review` on ClickUp.
    pub status: String,
    /// Native priority token. Board priorities are the numeric priority id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub last_updated: DateTime<Utc>,
    /// Project (tickets) or list (board) the item lives in.
    pub container_name: String,
}

/// Fields for a counterpart item about to be created on the other side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterpartFields {
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A persisted pairing of one ticket with one board task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub ticket_id: ItemId,
    pub board_id: ItemId,
    /// Watermark: changes newer than this have not been propagated yet.
    pub last_synced: DateTime<Utc>,
}

impl Link {
    pub fn new(ticket_id: ItemId, board_id: ItemId, last_synced: DateTime<Utc>) -> Self {
        Self {
            ticket_id,
            board_id,
            last_synced,
        }
    }

    /// Build a link from a source item on `side` and its counterpart on the other side.
    pub fn between(side: Side, id: ItemId, counterpart: ItemId, last_synced: DateTime<Utc>) -> Self {
        match side {
            Side::Tickets => Self::new(id, counterpart, last_synced),
            Side::Board => Self::new(counterpart, id, last_synced),
        }
    }

    /// The identifier this link holds for `side`.
    pub fn id_for(&self, side: Side) -> &ItemId {
        match side {
            Side::Tickets => &self.ticket_id,
            Side::Board => &self.board_id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
