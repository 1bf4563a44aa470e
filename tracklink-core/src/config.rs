//! YAML configuration for tracklink.
//!
//! # Storage layout
//!
//! ```text
//! ~/.tracklink/
//!   config.yaml   (credentials, container names, vocabularies, mode 0600)
//!   links.json    (link store, default location)
//! ```
//!
//! # API pattern
//!
//! Like the rest of the workspace, functions that touch the home directory
//! come in two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// Env var overriding `jira.api_token`.
pub const JIRA_TOKEN_ENV: &str = "TRACKLINK_JIRA_TOKEN";
/// Env var overriding `clickup.api_token`.
pub const CLICKUP_TOKEN_ENV: &str = "TRACKLINK_CLICKUP_TOKEN";

// ---------------------------------------------------------------------------
// 1. Vocabulary map
// ---------------------------------------------------------------------------

/// Ordered `ticket token → board token` translation table.
///
/// File order is preserved so that reverse lookups are deterministic: when
/// several ticket tokens map to the same board token, the first one listed
/// wins. All comparisons ignore ASCII case.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VocabularyMap {
    entries: Vec<(String, String)>,
}

impl VocabularyMap {
    pub fn new<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Board token for a ticket token.
    pub fn forward(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// First ticket token whose board token equals `value`.
    pub fn reverse(&self, value: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, v)| v.eq_ignore_ascii_case(value))
            .map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for VocabularyMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

/// Scalar accepted as a vocabulary key or value (`High: 2` and `High: "2"`
/// mean the same thing).
#[derive(Deserialize)]
#[serde(untagged)]
enum Token {
    Text(String),
    Int(i64),
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        match token {
            Token::Text(s) => s,
            Token::Int(n) => n.to_string(),
        }
    }
}

struct VocabularyVisitor;

impl<'de> Visitor<'de> for VocabularyVisitor {
    type Value = VocabularyMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of vocabulary tokens")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
        while let Some((key, value)) = access.next_entry::<Token, Token>()? {
            entries.push((String::from(key), String::from(value)));
        }
        Ok(VocabularyMap { entries })
    }
}

impl<'de> Deserialize<'de> for VocabularyMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(VocabularyVisitor)
    }
}

// ---------------------------------------------------------------------------
// 2. Config structs
// ---------------------------------------------------------------------------

/// Connection details for the ticketing backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Site root, e.g. `https://company.atlassian.net/`.
    pub url: String,
    pub email: String,
    #[serde(default)]
    pub api_token: String,
    /// Project key, e.g. `RES`.
    pub project: String,
    /// Display name used in imported titles and descriptions.
    #[serde(default = "default_jira_name")]
    pub name: String,
}

/// Connection details for the task-board backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickUpConfig {
    #[serde(default)]
    pub api_token: String,
    pub team: String,
    pub space: String,
    /// Folder holding every synced list.
    pub project: String,
    /// List new tasks are created in.
    pub list: String,
    /// Display name used in imported titles and descriptions.
    #[serde(default = "default_clickup_name")]
    pub name: String,
}

/// Vocabularies and fallbacks used by the field mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingConfig {
    /// Ticket status → board status.
    #[serde(default = "default_status_map")]
    pub status: VocabularyMap,
    /// Ticket priority name → board priority id.
    #[serde(default = "default_priority_map")]
    pub priority: VocabularyMap,
    #[serde(default = "default_board_status")]
    pub default_board_status: String,
    #[serde(default = "default_ticket_status")]
    pub default_ticket_status: String,
    #[serde(default = "default_board_priority")]
    pub default_board_priority: String,
    #[serde(default = "default_ticket_priority")]
    pub default_ticket_priority: String,
    /// Replaces spaces in list names turned into ticket labels.
    #[serde(default = "default_label_connector")]
    pub label_connector: String,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            status: default_status_map(),
            priority: default_priority_map(),
            default_board_status: default_board_status(),
            default_ticket_status: default_ticket_status(),
            default_board_priority: default_board_priority(),
            default_ticket_priority: default_ticket_priority(),
            label_connector: default_label_connector(),
        }
    }
}

/// Root of `config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub jira: JiraConfig,
    pub clickup: ClickUpConfig,
    #[serde(default)]
    pub mapping: MappingConfig,
    /// Link store location; relative paths resolve against the config file's directory.
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
    /// Delay between daemon passes.
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u64,
    /// Per-request timeout for both HTTP adapters.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_jira_name() -> String {
    "JIRA".to_string()
}

fn default_clickup_name() -> String {
    "ClickUp".to_string()
}

fn default_status_map() -> VocabularyMap {
    VocabularyMap::new([
        ("TO DO", "OPEN"),
        ("HOLD", "HOLD"),
        ("IN PROGRESS", "IN PROGRESS"),
        ("REVIEW", "REVIEW"),
        ("DONE", "CLOSED"),
    ])
}

// ClickUp priorities: 1 urgent, 2 high, 3 normal, 4 low.
fn default_priority_map() -> VocabularyMap {
    VocabularyMap::new([
        ("Lowest", "4"),
        ("Low", "4"),
        ("Medium", "3"),
        ("High", "2"),
        ("Highest", "1"),
    ])
}

fn default_board_status() -> String {
    "OPEN".to_string()
}

fn default_ticket_status() -> String {
    "TO DO".to_string()
}

fn default_board_priority() -> String {
    "1".to_string()
}

fn default_ticket_priority() -> String {
    "Medium".to_string()
}

fn default_label_connector() -> String {
    "_".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("links.json")
}

fn default_interval_minutes() -> u64 {
    10
}

fn default_http_timeout_secs() -> u64 {
    60
}

impl Config {
    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mapping.label_connector.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid(
                "mapping.label_connector must not contain whitespace".to_string(),
            ));
        }
        if self.http_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "http_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Check that both backends can be authenticated against.
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        let missing: Vec<&str> = [
            ("jira.url", self.jira.url.as_str()),
            ("jira.email", self.jira.email.as_str()),
            ("jira.api_token", self.jira.api_token.as_str()),
            ("clickup.api_token", self.clickup.api_token.as_str()),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(format!(
                "missing credentials: {}",
                missing.join(", ")
            )))
        }
    }

    /// Replace API tokens with non-empty overrides.
    pub fn with_token_overrides(mut self, jira: Option<String>, clickup: Option<String>) -> Self {
        if let Some(token) = jira.filter(|t| !t.is_empty()) {
            self.jira.api_token = token;
        }
        if let Some(token) = clickup.filter(|t| !t.is_empty()) {
            self.clickup.api_token = token;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// 3. Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.tracklink/`: pure, no I/O.
pub fn tracklink_dir_at(home: &Path) -> PathBuf {
    home.join(".tracklink")
}

/// `<home>/.tracklink/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    tracklink_dir_at(home).join("config.yaml")
}

/// `config_path_at` convenience wrapper.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    Ok(config_path_at(&home()?))
}

// ---------------------------------------------------------------------------
// 4. Load
// ---------------------------------------------------------------------------

/// Load and validate the config file at `path`.
///
/// `store_path` is resolved against the file's directory. Token env vars
/// are *not* applied here; see [`load`].
///
/// Returns `ConfigError::NotFound` if absent,
/// `ConfigError::Parse` (with path + line context) if malformed YAML.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path)?;
    let mut config: Config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    if config.store_path.is_relative() {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.store_path = base.join(&config.store_path);
    }
    config.validate()?;
    Ok(config)
}

/// Load `path` (or `~/.tracklink/config.yaml`) and apply token env overrides.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    let config = load_from(&path)?;
    Ok(config.with_token_overrides(
        std::env::var(JIRA_TOKEN_ENV).ok(),
        std::env::var(CLICKUP_TOKEN_ENV).ok(),
    ))
}

// ---------------------------------------------------------------------------
// 5. Template
// ---------------------------------------------------------------------------

/// Commented starter config with the stock vocabularies.
pub const TEMPLATE: &str = r#"# tracklink configuration
jira:
  url: https://COMPANY.atlassian.net/
  email: you@example.com
  api_token: ""            # or set TRACKLINK_JIRA_TOKEN
  project: RES
clickup:
  api_token: ""            # or set TRACKLINK_CLICKUP_TOKEN
  team: ""
  space: ""
  project: Task management
  list: Other

mapping:
  # Jira status -> ClickUp status. Reverse lookups take the first match.
  status:
    TO DO: OPEN
    HOLD: HOLD
    IN PROGRESS: IN PROGRESS
    REVIEW: REVIEW
    DONE: CLOSED
  # Jira priority -> ClickUp priority (1 urgent, 2 high, 3 normal, 4 low)
  priority:
    Lowest: 4
    Low: 4
    Medium: 3
    High: 2
    Highest: 1
  default_board_status: OPEN
  default_ticket_status: TO DO
  default_board_priority: "1"
  default_ticket_priority: Medium
  label_connector: _

store_path: links.json
interval_minutes: 10
http_timeout_secs: 60
"#;

/// Write [`TEMPLATE`] to `path` (mode 0600).
///
/// Returns `false` without touching the file if it exists and `force` is unset.
pub fn write_template(path: &Path, force: bool) -> Result<bool, ConfigError> {
    if path.exists() && !force {
        return Ok(false);
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let tmp = path.with_extension("yaml.tmp");
    std::fs::write(&tmp, TEMPLATE)?;
    set_file_permissions(&tmp)?;
    std::fs::rename(&tmp, path)?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// 6. Helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), ConfigError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), ConfigError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
