//! ClickUp API v2 adapter for the board side.
//!
//! The synced container is a folder (ClickUp's "project") inside a space
//! inside a team. Every list of that folder is read; new tasks go to one
//! configured list.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use tracklink_core::{Backend, ClickUpConfig, CounterpartFields, Item, ItemId, RemoteError, Side};

use crate::http::{join, Http};

pub const API_ROOT: &str = "https://api.clickup.com/api/v2";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Anything in the team/space/folder/list hierarchy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct Teams {
    #[serde(default)]
    teams: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct Spaces {
    #[serde(default)]
    spaces: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct Folders {
    #[serde(default)]
    folders: Vec<Folder>,
}

#[derive(Debug, Deserialize)]
struct Folder {
    id: String,
    name: String,
    #[serde(default)]
    lists: Vec<Node>,
}

#[derive(Debug, Deserialize)]
pub struct TaskPage {
    #[serde(default)]
    pub tasks: Vec<ClickUpTask>,
    pub last_page: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ClickUpTask {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Option<TaskPriority>,
    pub due_date: Option<Millis>,
    pub date_updated: Option<Millis>,
    pub list: Option<Node>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatus {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TaskPriority {
    pub id: Millis,
}

/// ClickUp sends numbers as strings in some places and as numbers in others.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Millis {
    Text(String),
    Number(i64),
}

impl Millis {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Millis::Text(s) => s.trim().parse().ok(),
            Millis::Number(n) => Some(*n),
        }
    }

    fn into_string(self) -> String {
        match self {
            Millis::Text(s) => s,
            Millis::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    id: String,
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Milliseconds since the epoch, as ClickUp stores every timestamp.
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Midnight UTC of `date`, in milliseconds.
pub fn date_to_millis(date: NaiveDate) -> Option<i64> {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| Utc.from_utc_datetime(&dt).timestamp_millis())
}

/// Pick a node by name, falling back to an exact id match.
pub fn find_node<'n>(nodes: &'n [Node], wanted: &str, kind: &'static str) -> Result<&'n Node, RemoteError> {
    nodes
        .iter()
        .find(|n| n.name.eq_ignore_ascii_case(wanted))
        .or_else(|| nodes.iter().find(|n| n.id == wanted))
        .ok_or_else(|| RemoteError::NotFound {
            kind,
            name: wanted.to_string(),
        })
}

/// Normalise one task. `list_name` is used when the task omits its list.
pub fn task_to_item(task: ClickUpTask, list_name: &str) -> Result<Item, String> {
    let last_updated = task
        .date_updated
        .as_ref()
        .and_then(Millis::as_i64)
        .and_then(from_millis)
        .ok_or_else(|| format!("task {} has no usable date_updated", task.id))?;
    let due_date = task
        .due_date
        .as_ref()
        .and_then(Millis::as_i64)
        .and_then(from_millis)
        .map(|dt| dt.date_naive());

    Ok(Item {
        side: Side::Board,
        id: ItemId::from(task.id),
        title: task.name,
        description: task.description.filter(|d| !d.is_empty()),
        status: task.status.status,
        priority: task.priority.map(|p| p.id.into_string()),
        due_date,
        last_updated,
        container_name: task
            .list
            .map(|l| l.name)
            .unwrap_or_else(|| list_name.to_string()),
    })
}

/// Normalise one page of tasks, skipping the ones that cannot be read.
pub fn decode_tasks(tasks: Vec<ClickUpTask>, list_name: &str) -> Vec<Item> {
    tasks
        .into_iter()
        .filter_map(|task| match task_to_item(task, list_name) {
            Ok(item) => Some(item),
            Err(reason) => {
                tracing::warn!(list = %list_name, %reason, "skipping unreadable task");
                None
            }
        })
        .collect()
}

/// Body of `POST /list/{id}/task`.
///
/// Non-numeric priorities are dropped; ClickUp only accepts ids 1 to 4.
pub fn create_body(fields: &CounterpartFields) -> Value {
    let mut body = json!({
        "name": fields.title,
        "description": fields.description,
        "status": fields.status,
    });
    if let Some(priority) = fields.priority.as_deref().and_then(|p| p.trim().parse::<u8>().ok()) {
        body["priority"] = json!(priority);
    }
    if let Some(ms) = fields.due_date.and_then(date_to_millis) {
        body["due_date"] = json!(ms);
        body["due_date_time"] = json!(false);
    }
    body
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Board backend over ClickUp's REST API v2.
pub struct ClickUpClient {
    http: Http,
    api_root: String,
    /// Every list of the synced folder.
    lists: Vec<Node>,
    /// Where new tasks are created.
    default_list: Node,
}

impl ClickUpClient {
    /// Connect and resolve the configured team/space/folder/list path.
    pub fn connect(config: &ClickUpConfig, timeout: Duration) -> Result<Self, RemoteError> {
        Self::connect_to(API_ROOT, config, timeout)
    }

    /// Like [`ClickUpClient::connect`] against a different API root.
    pub fn connect_to(api_root: &str, config: &ClickUpConfig, timeout: Duration) -> Result<Self, RemoteError> {
        let http = Http::new(config.api_token.clone(), timeout);
        let (lists, default_list) = resolve_container_path(&http, api_root, config)?;
        tracing::debug!(
            folder = %config.project,
            list = %default_list.name,
            lists = lists.len(),
            "resolved board container"
        );
        Ok(Self {
            http,
            api_root: api_root.to_string(),
            lists,
            default_list,
        })
    }

    fn url(&self, path: &str) -> String {
        join(&self.api_root, path)
    }

    fn fetch_list(&self, list: &Node, items: &mut Vec<Item>) -> Result<(), RemoteError> {
        let url = self.url(&format!("list/{}/task", list.id));
        for page in 0u32.. {
            let page_param = page.to_string();
            let response: TaskPage = self.http.get_json(
                &url,
                &[
                    ("include_closed", "true"),
                    ("subtasks", "true"),
                    ("page", page_param.as_str()),
                ],
            )?;
            let last = response.tasks.is_empty() || response.last_page == Some(true);
            items.extend(decode_tasks(response.tasks, &list.name));
            if last {
                break;
            }
        }
        Ok(())
    }
}

fn resolve_container_path(
    http: &Http,
    api_root: &str,
    config: &ClickUpConfig,
) -> Result<(Vec<Node>, Node), RemoteError> {
    let teams: Teams = http.get_json(&join(api_root, "team"), &[])?;
    let team = find_node(&teams.teams, &config.team, "team")?;

    let spaces: Spaces = http.get_json(
        &join(api_root, &format!("team/{}/space", team.id)),
        &[("archived", "false")],
    )?;
    let space = find_node(&spaces.spaces, &config.space, "space")?;

    let folders: Folders = http.get_json(
        &join(api_root, &format!("space/{}/folder", space.id)),
        &[("archived", "false")],
    )?;
    let folder = folders
        .folders
        .into_iter()
        .find(|f| f.name.eq_ignore_ascii_case(&config.project) || f.id == config.project)
        .ok_or_else(|| RemoteError::NotFound {
            kind: "folder",
            name: config.project.clone(),
        })?;

    let default_list = find_node(&folder.lists, &config.list, "list")?.clone();
    Ok((folder.lists, default_list))
}

impl Backend for ClickUpClient {
    fn side(&self) -> Side {
        Side::Board
    }

    fn fetch_all(&self) -> Result<Vec<Item>, RemoteError> {
        let mut items = Vec::new();
        for list in &self.lists {
            self.fetch_list(list, &mut items)?;
        }
        tracing::debug!(lists = self.lists.len(), count = items.len(), "fetched board tasks");
        Ok(items)
    }

    fn get(&self, id: &ItemId) -> Result<Item, RemoteError> {
        let url = self.url(&format!("task/{id}"));
        let task: ClickUpTask = match self.http.get_json(&url, &[]) {
            Err(RemoteError::Http { status: 404, .. }) => {
                return Err(RemoteError::NotFound {
                    kind: "task",
                    name: id.to_string(),
                })
            }
            other => other?,
        };
        task_to_item(task, &self.default_list.name).map_err(|message| RemoteError::Decode { url, message })
    }

    fn create(&self, fields: &CounterpartFields) -> Result<ItemId, RemoteError> {
        let url = self.url(&format!("list/{}/task", self.default_list.id));
        let created: CreatedTask = self.http.send_json("POST", &url, &create_body(fields))?;
        Ok(ItemId::from(created.id))
    }

    fn set_status(&self, id: &ItemId, status: &str) -> Result<(), RemoteError> {
        let url = self.url(&format!("task/{id}"));
        match self.http.send("PUT", &url, &json!({ "status": status })) {
            Err(RemoteError::Http { status: 400, body, .. }) => Err(RemoteError::TransitionRejected {
                id: id.clone(),
                status: status.to_string(),
                reason: body,
            }),
            other => other,
        }
    }
}
