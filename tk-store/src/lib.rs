//! `RuleStore` and `EventSink` traits consumed by the core, with an
//! in-memory implementation (tests, small deployments) and an optional
//! Postgres-backed one (`postgres` feature).
//!
//! Schema migrations and driver selection are out of scope here: the
//! Postgres implementation assumes a pre-existing `rules`/`events` schema.

pub mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryEventSink, InMemoryRuleStore};
pub use store::{AppendResult, EventRecord, EventSink, RuleStore, SensorDiagnostics};

#[cfg(feature = "postgres")]
pub use postgres::{PostgresEventSink, PostgresRuleStore};
