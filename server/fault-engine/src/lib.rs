//! Batch fault alerting pipeline for rotating equipment logs.
//!
//! One invocation performs one ingest -> suppress -> merge -> evaluate ->
//! persist -> notify cycle over every configured fault type, then exits.
//! State survives runs through the durable per-type instance stores and
//! the resume-marker file; no incident is reported twice and none is
//! silently dropped across restarts.
//!
//! No network, no DB, no UI; file reads, pure computation, JSON-lines out.

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod lookup;
pub mod markers;
pub mod router;
pub mod store;
pub mod summary;
pub mod suppress;
pub mod threshold;
pub mod timeseries;
pub mod types;

pub use catalog::FaultTypeCatalog;
pub use config::Config;
pub use engine::{Engine, RunReport};
pub use error::EngineError;
pub use router::{JsonLineRouter, NotificationRouter};
pub use types::{Occurrence, Threshold};
