//! # tracklink-sync
//!
//! Link store, field mapping and the reconciliation engine.
//!
//! Call [`pipeline::run_once`] to run one full pass against the configured
//! backends, or build a [`Reconciler`] directly over any two [`Backend`]s.
//!
//! [`Backend`]: tracklink_core::Backend

pub mod engine;
pub mod error;
pub mod link_store;
pub mod mapper;
pub mod memory;
pub mod pipeline;

pub use engine::{ItemOutcome, PassOptions, PassReport, PassSummary, Reconciler};
pub use error::SyncError;
pub use link_store::LinkStore;
pub use mapper::FieldMapper;
