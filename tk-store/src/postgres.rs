//! Postgres-backed `RuleStore`/`EventSink`, demonstrating the interface
//! against a real driver.
//!
//! Schema migrations are out of scope: this implementation assumes a
//! pre-existing `rules` table and `events`/event-index table and only
//! issues plain queries against them via a pooled connection.

use crate::error::{StoreError, StoreResult};
use crate::store::{AppendResult, EventRecord, EventSink, RuleStore};
use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use tk_core::identity::{EntityIdType, Timestamp};
use tk_core::rule::Rule;
use tokio_postgres::Row;

async fn checkout(pool: &Pool) -> StoreResult<Object> {
    pool.get().await.map_err(|e| {
        tracing::warn!(error = %e, "failed to check out a pooled Postgres connection");
        StoreError::Unavailable(e.to_string())
    })
}

pub struct PostgresRuleStore {
    pool: Pool,
}

impl PostgresRuleStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn row_to_rule(row: &Row) -> StoreResult<Rule> {
        let body_json: serde_json::Value = row
            .try_get("body")
            .map_err(|e| StoreError::Transient(e.to_string()))?;
        let body = serde_json::from_value(body_json)
            .map_err(|e| StoreError::Constraint(format!("malformed rule body: {e}")))?;
        let scope_tags_vec: Vec<String> = row
            .try_get("scope_tags")
            .map_err(|e| StoreError::Transient(e.to_string()))?;

        Ok(Rule {
            id: {
                use tk_core::identity::EntityIdType;
                let uuid: uuid::Uuid = row
                    .try_get("id")
                    .map_err(|e| StoreError::Transient(e.to_string()))?;
                tk_core::identity::RuleId::new(uuid)
            },
            name: row
                .try_get("name")
                .map_err(|e| StoreError::Transient(e.to_string()))?,
            description: row
                .try_get("description")
                .map_err(|e| StoreError::Transient(e.to_string()))?,
            action: serde_json::from_value(
                row.try_get("action")
                    .map_err(|e| StoreError::Transient(e.to_string()))?,
            )
            .map_err(|e| StoreError::Constraint(e.to_string()))?,
            sample_rate: row
                .try_get("sample_rate")
                .map_err(|e| StoreError::Transient(e.to_string()))?,
            scope_tags: scope_tags_vec.into_iter().collect(),
            state: serde_json::from_value(
                row.try_get("state")
                    .map_err(|e| StoreError::Transient(e.to_string()))?,
            )
            .map_err(|e| StoreError::Constraint(e.to_string()))?,
            body,
            created_at: row
                .try_get("created_at")
                .map_err(|e| StoreError::Transient(e.to_string()))?,
            modified_at: row
                .try_get("modified_at")
                .map_err(|e| StoreError::Transient(e.to_string()))?,
            deleted_at: row
                .try_get("deleted_at")
                .map_err(|e| StoreError::Transient(e.to_string()))?,
        })
    }
}

#[async_trait]
impl RuleStore for PostgresRuleStore {
    async fn list_active(&self, tags: &[String]) -> StoreResult<Vec<Rule>> {
        let client = checkout(&self.pool).await?;

        let rows = if tags.is_empty() {
            client
                .query(
                    "SELECT * FROM rules WHERE state = 'active' AND deleted_at IS NULL",
                    &[],
                )
                .await
        } else {
            client
                .query(
                    "SELECT * FROM rules WHERE state = 'active' AND deleted_at IS NULL \
                     AND scope_tags && $1",
                    &[&tags],
                )
                .await
        }
        .map_err(|e| StoreError::Transient(e.to_string()))?;

        rows.iter().map(Self::row_to_rule).collect()
    }

    async fn get_by_modified_after(&self, cursor: Option<Timestamp>) -> StoreResult<Vec<Rule>> {
        let client = checkout(&self.pool).await?;

        let rows = match cursor {
            Some(cursor) => client
                .query(
                    "SELECT * FROM rules WHERE deleted_at IS NULL AND modified_at > $1",
                    &[&cursor],
                )
                .await
                .map_err(|e| StoreError::Transient(e.to_string()))?,
            None => client
                .query("SELECT * FROM rules WHERE deleted_at IS NULL", &[])
                .await
                .map_err(|e| StoreError::Transient(e.to_string()))?,
        };

        rows.iter().map(Self::row_to_rule).collect()
    }

    async fn health_check(&self) -> StoreResult<()> {
        let client = checkout(&self.pool).await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}

pub struct PostgresEventSink {
    pool: Pool,
}

impl PostgresEventSink {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventSink for PostgresEventSink {
    async fn append(&self, event: &EventRecord) -> StoreResult<AppendResult> {
        let client = checkout(&self.pool).await?;

        let payload_bytes = serde_json::to_vec(&event.payload)
            .map_err(|e| StoreError::Constraint(e.to_string()))?;
        let metadata_json = serde_json::to_value(&event.metadata)
            .map_err(|e| StoreError::Constraint(e.to_string()))?;

        client
            .execute(
                "INSERT INTO events \
                 (event_id, tenant_id, sensor_id, client_timestamp, server_received_at, \
                  payload, metadata, payload_hash, matched_rule_count) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
                &[
                    &event.event_id.as_uuid(),
                    &event.tenant_id.as_uuid(),
                    &event.sensor_id.as_uuid(),
                    &event.client_timestamp,
                    &event.server_received_at,
                    &event.payload,
                    &metadata_json,
                    &hex::encode(event.payload_hash),
                    &(event.matched_rule_count as i32),
                ],
            )
            .await
            .map_err(|e| {
                if e.code().map(|c| c.code()) == Some("23505") {
                    StoreError::Constraint(format!("duplicate event_id {}", event.event_id))
                } else {
                    StoreError::Transient(e.to_string())
                }
            })?;

        Ok(AppendResult {
            bytes_written: payload_bytes.len(),
        })
    }

    async fn health_check(&self) -> StoreResult<()> {
        let client = checkout(&self.pool).await?;
        client
            .query_one("SELECT 1", &[])
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(())
    }
}
