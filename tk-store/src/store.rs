//! `RuleStore` and `EventSink`: the two interfaces the core consumes.

use crate::error::StoreResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tk_core::identity::{EventId, RuleId, SensorId, TenantId, Timestamp};
use tk_core::rule::Rule;

/// A rule store backs `SyncRules`: it lists the active rule set for a given
/// scope, and supports the cursor-based listing the sync service uses to
/// decide when a snapshot needs rebuilding.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// List every active, non-deleted rule whose scope tags intersect `tags`.
    /// An empty `tags` slice matches every rule (no scoping).
    async fn list_active(&self, tags: &[String]) -> StoreResult<Vec<Rule>>;

    /// List rules modified strictly after `cursor` (or all rules, if `None`),
    /// used by the sync service to detect whether a cached snapshot is stale.
    async fn get_by_modified_after(&self, cursor: Option<Timestamp>) -> StoreResult<Vec<Rule>>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// An event as submitted by a sensor, ready to be appended to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub event_id: EventId,
    pub tenant_id: TenantId,
    pub sensor_id: SensorId,
    pub client_timestamp: Timestamp,
    pub server_received_at: Timestamp,
    pub payload: serde_json::Value,
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub payload_hash: tk_core::identity::ContentHash,
    pub matched_rule_count: u32,
}

/// Where an appended event landed, and how large it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendResult {
    pub bytes_written: usize,
}

/// The append-only event sink: `EventSink::append` is the only write path.
/// Events have no update path; soft deletes, if ever
/// introduced by an operator tool, are honored as a `deleted_at IS NULL`
/// filter on any listing, never as a mutation of the row itself.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn append(&self, event: &EventRecord) -> StoreResult<AppendResult>;

    async fn health_check(&self) -> StoreResult<()>;
}

/// Diagnostics the core exposes read-only, used to answer `GetDiagnostics`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorDiagnostics {
    pub rules_synced_count: usize,
    pub last_sync_time: Option<Timestamp>,
    pub active_rule_ids: Vec<RuleId>,
}
