//! Jira Cloud REST v2 adapter for the tickets side.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use tracklink_core::{Backend, CounterpartFields, Item, ItemId, JiraConfig, RemoteError, Side};

use crate::http::{join, Http};

/// Issues requested per search page.
pub const PAGE_SIZE: u32 = 100;

/// Fields requested for every issue.
const ISSUE_FIELDS: &str = "summary,description,status,priority,duedate,updated,project";

/// Issue type used for imported tasks.
const ISSUE_TYPE: &str = "Task";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    #[serde(default)]
    pub start_at: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub issues: Vec<JiraIssue>,
}

#[derive(Debug, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    pub fields: IssueFields,
}

#[derive(Debug, Deserialize)]
pub struct IssueFields {
    #[serde(default)]
    pub summary: String,
    pub description: Option<String>,
    pub status: Named,
    pub priority: Option<Named>,
    pub duedate: Option<String>,
    #[serde(default)]
    pub updated: String,
    pub project: Option<ProjectRef>,
}

#[derive(Debug, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ProjectRef {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct Transitions {
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Deserialize)]
pub struct Transition {
    pub id: String,
    pub name: String,
    pub to: Option<Named>,
}

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

// ---------------------------------------------------------------------------
// Pure helpers
// ---------------------------------------------------------------------------

/// Parse Jira's `2024-03-01T10:15:30.123+0000` timestamps into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Normalise one issue; `project` is used when the issue omits its project.
pub fn issue_to_item(issue: JiraIssue, project: &str) -> Result<Item, String> {
    let last_updated = parse_timestamp(&issue.fields.updated).ok_or_else(|| {
        format!(
            "issue {} has unparseable updated timestamp '{}'",
            issue.key, issue.fields.updated
        )
    })?;
    let due_date = issue
        .fields
        .duedate
        .as_deref()
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

    Ok(Item {
        side: Side::Tickets,
        id: ItemId::from(issue.key),
        title: issue.fields.summary,
        description: issue.fields.description.filter(|d| !d.is_empty()),
        status: issue.fields.status.name,
        priority: issue.fields.priority.map(|p| p.name),
        due_date,
        last_updated,
        container_name: issue
            .fields
            .project
            .map(|p| p.key)
            .unwrap_or_else(|| project.to_string()),
    })
}

/// Normalise a search page, skipping issues that cannot be read.
pub fn decode_issues(issues: Vec<JiraIssue>, project: &str) -> Vec<Item> {
    issues
        .into_iter()
        .filter_map(|issue| match issue_to_item(issue, project) {
            Ok(item) => Some(item),
            Err(reason) => {
                tracing::warn!(project = %project, %reason, "skipping unreadable issue");
                None
            }
        })
        .collect()
}

/// Body of `POST /rest/api/2/issue`. Status is set afterwards by transition.
pub fn create_body(project: &str, fields: &CounterpartFields) -> Value {
    let mut body = json!({
        "project": { "key": project },
        "summary": fields.title,
        "description": fields.description,
        "issuetype": { "name": ISSUE_TYPE },
        "labels": fields.labels,
    });
    if let Some(priority) = &fields.priority {
        body["priority"] = json!({ "name": priority });
    }
    if let Some(due) = fields.due_date {
        body["duedate"] = json!(due.format("%Y-%m-%d").to_string());
    }
    json!({ "fields": body })
}

/// Find the transition leading to `status`, by transition name or target
/// status name, ignoring ASCII case.
pub fn find_transition<'t>(transitions: &'t [Transition], status: &str) -> Option<&'t Transition> {
    transitions.iter().find(|t| {
        t.name.eq_ignore_ascii_case(status)
            || t.to
                .as_ref()
                .is_some_and(|to| to.name.eq_ignore_ascii_case(status))
    })
}

/// Value of the basic-auth `Authorization` header.
pub fn basic_auth(email: &str, token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{email}:{token}")))
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Tickets backend over Jira's REST API v2.
pub struct JiraClient {
    http: Http,
    base_url: String,
    project: String,
}

impl JiraClient {
    pub fn new(config: &JiraConfig, timeout: Duration) -> Self {
        Self {
            http: Http::new(basic_auth(&config.email, &config.api_token), timeout),
            base_url: config.url.clone(),
            project: config.project.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        join(&self.base_url, path)
    }

    fn decode_issue(&self, url: &str, issue: JiraIssue) -> Result<Item, RemoteError> {
        issue_to_item(issue, &self.project).map_err(|message| RemoteError::Decode {
            url: url.to_string(),
            message,
        })
    }

    fn transition(&self, id: &ItemId, status: &str) -> Result<(), RemoteError> {
        let url = self.url(&format!("rest/api/2/issue/{id}/transitions"));
        let available: Transitions = self.http.get_json(&url, &[])?;
        let Some(transition) = find_transition(&available.transitions, status) else {
            let names: Vec<&str> = available.transitions.iter().map(|t| t.name.as_str()).collect();
            return Err(RemoteError::TransitionRejected {
                id: id.clone(),
                status: status.to_string(),
                reason: format!("no transition to '{status}' (available: {})", names.join(", ")),
            });
        };

        let body = json!({ "transition": { "id": transition.id } });
        match self.http.send("POST", &url, &body) {
            Err(RemoteError::Http { status: code @ (400 | 409), body, .. }) => {
                Err(RemoteError::TransitionRejected {
                    id: id.clone(),
                    status: status.to_string(),
                    reason: format!("HTTP {code}: {body}"),
                })
            }
            other => other,
        }
    }
}

impl Backend for JiraClient {
    fn side(&self) -> Side {
        Side::Tickets
    }

    fn fetch_all(&self) -> Result<Vec<Item>, RemoteError> {
        let url = self.url("rest/api/2/search");
        let jql = format!("project={}", self.project);
        let max_results = PAGE_SIZE.to_string();
        let mut items = Vec::new();
        let mut start_at = 0u32;

        loop {
            let start = start_at.to_string();
            let page: SearchPage = self.http.get_json(
                &url,
                &[
                    ("jql", jql.as_str()),
                    ("startAt", start.as_str()),
                    ("maxResults", max_results.as_str()),
                    ("fields", ISSUE_FIELDS),
                ],
            )?;
            let fetched = page.issues.len() as u32;
            items.extend(decode_issues(page.issues, &self.project));
            start_at = page.start_at + fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }

        tracing::debug!(project = %self.project, count = items.len(), "fetched tickets");
        Ok(items)
    }

    fn get(&self, id: &ItemId) -> Result<Item, RemoteError> {
        let url = self.url(&format!("rest/api/2/issue/{id}"));
        let issue: JiraIssue = match self.http.get_json(&url, &[("fields", ISSUE_FIELDS)]) {
            Err(RemoteError::Http { status: 404, .. }) => {
                return Err(RemoteError::NotFound {
                    kind: "issue",
                    name: id.to_string(),
                })
            }
            other => other?,
        };
        self.decode_issue(&url, issue)
    }

    fn create(&self, fields: &CounterpartFields) -> Result<ItemId, RemoteError> {
        let url = self.url("rest/api/2/issue");
        let created: CreatedIssue =
            self.http
                .send_json("POST", &url, &create_body(&self.project, fields))?;
        let id = ItemId::from(created.key);

        // New issues start in the workflow's initial status; move them over
        // when possible but keep the issue either way.
        if let Err(e) = self.transition(&id, &fields.status) {
            tracing::warn!(
                ticket = %id,
                to = %fields.status,
                error = %e,
                "created issue but could not set its status"
            );
        }
        Ok(id)
    }

    fn set_status(&self, id: &ItemId, status: &str) -> Result<(), RemoteError> {
        self.transition(id, status)
    }
}
