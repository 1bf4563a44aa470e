//! Tracklink core library: domain types, backend port, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: sides, items, links and counterpart fields
//! - [`backend`]: the [`Backend`] port both task trackers implement
//! - [`clock`]: the [`Clock`] port used to stamp sync passes
//! - [`config`]: YAML configuration load / save / template
//! - [`error`]: [`ConfigError`], [`RemoteError`]

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use backend::Backend;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ClickUpConfig, Config, JiraConfig, MappingConfig, VocabularyMap};
pub use error::{ConfigError, RemoteError};
pub use types::{CounterpartFields, Item, ItemId, Link, Side};
