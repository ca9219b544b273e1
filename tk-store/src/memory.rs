//! In-memory `RuleStore`/`EventSink`, used by tests and small deployments.

use crate::error::StoreResult;
use crate::store::{AppendResult, EventRecord, EventSink, RuleStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tk_core::identity::{RuleId, Timestamp};
use tk_core::rule::Rule;

/// An in-memory rule store backed by a single read-write lock.
///
/// Writes are serialized by the lock (single-writer discipline);
/// readers get a consistent snapshot for the duration of their call. This
/// is the reference implementation used across `tk-core`'s and
/// `tk-server`'s own test suites.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<HashMap<RuleId, Rule>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(rules: impl IntoIterator<Item = Rule>) -> Self {
        let store = Self::new();
        {
            let mut guard = store.rules.write().expect("lock poisoned");
            for rule in rules {
                guard.insert(rule.id, rule);
            }
        }
        store
    }

    pub fn upsert(&self, rule: Rule) {
        self.rules
            .write()
            .expect("lock poisoned")
            .insert(rule.id, rule);
    }

    pub fn soft_delete(&self, id: RuleId, deleted_at: Timestamp) {
        if let Some(rule) = self.rules.write().expect("lock poisoned").get_mut(&id) {
            rule.deleted_at = Some(deleted_at);
            rule.modified_at = deleted_at;
        }
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn list_active(&self, tags: &[String]) -> StoreResult<Vec<Rule>> {
        let guard = self.rules.read().expect("lock poisoned");
        Ok(guard
            .values()
            .filter(|r| r.is_active() && (tags.is_empty() || r.matches_scope(tags)))
            .cloned()
            .collect())
    }

    async fn get_by_modified_after(&self, cursor: Option<Timestamp>) -> StoreResult<Vec<Rule>> {
        let guard = self.rules.read().expect("lock poisoned");
        Ok(guard
            .values()
            .filter(|r| cursor.map_or(true, |c| r.modified_at > c))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// An in-memory, append-only event sink.
#[derive(Debug, Default)]
pub struct InMemoryEventSink {
    events: RwLock<Vec<EventRecord>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EventRecord> {
        self.events.read().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl EventSink for InMemoryEventSink {
    async fn append(&self, event: &EventRecord) -> StoreResult<AppendResult> {
        let bytes_written = serde_json::to_vec(&event.payload)
            .map(|v| v.len())
            .unwrap_or(0);
        self.events
            .write()
            .expect("lock poisoned")
            .push(event.clone());
        Ok(AppendResult { bytes_written })
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tk_core::rule::RuleState;

    fn rule(tags: &[&str], state: RuleState) -> Rule {
        let mut r = tk_testkit::fixtures::rule_with_groups(vec![]);
        r.scope_tags = tags.iter().map(|t| t.to_string()).collect();
        r.state = state;
        r
    }

    #[tokio::test]
    async fn list_active_filters_state_and_scope() {
        let active = rule(&["prod"], RuleState::Active);
        let draft = rule(&["prod"], RuleState::Draft);
        let other_scope = rule(&["staging"], RuleState::Active);
        let store = InMemoryRuleStore::seed([active.clone(), draft, other_scope]);

        let result = store.list_active(&["prod".to_string()]).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, active.id);
    }

    #[tokio::test]
    async fn soft_deleted_rules_are_excluded() {
        let r = rule(&[], RuleState::Active);
        let store = InMemoryRuleStore::seed([r.clone()]);
        store.soft_delete(r.id, chrono::Utc::now());
        assert!(store.list_active(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_by_modified_after_respects_cursor() {
        let r = rule(&[], RuleState::Active);
        let store = InMemoryRuleStore::seed([r.clone()]);
        let future_cursor = r.modified_at + chrono::Duration::seconds(1);
        assert!(store
            .get_by_modified_after(Some(future_cursor))
            .await
            .unwrap()
            .is_empty());
        assert_eq!(store.get_by_modified_after(None).await.unwrap().len(), 1);
    }
}
