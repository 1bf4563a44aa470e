//! # tracklink-remote
//!
//! Blocking HTTP adapters implementing [`tracklink_core::Backend`]:
//! [`JiraClient`] for the tickets side and [`ClickUpClient`] for the board.
//!
//! Response decoding and request bodies live in pure functions so they can be
//! tested against recorded payloads without a network.

pub mod clickup;
mod http;
pub mod jira;

pub use clickup::ClickUpClient;
pub use jira::JiraClient;
