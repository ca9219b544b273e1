//! Server side of the rule synchronization protocol: build a
//! scope-filtered snapshot, fingerprint it, and short-circuit when the
//! caller's cached fingerprint is already current.

use std::sync::Arc;

use tk_core::identity::Timestamp;
use tk_core::rule::Rule;
use tk_core::{compute_fingerprint, Fingerprint};
use tk_store::RuleStore;

use crate::error::SyncError;

pub struct SyncResponse {
    pub fingerprint: Fingerprint,
    /// Empty when the caller's fingerprint already matched.
    pub rules: Vec<Rule>,
}

pub struct RuleSyncService<S> {
    store: Arc<S>,
}

impl<S: RuleStore> RuleSyncService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn sync(
        &self,
        scope_tags: &[String],
        prior_fingerprint: Option<&Fingerprint>,
    ) -> Result<SyncResponse, SyncError> {
        let started = std::time::Instant::now();
        let result = self.sync_inner(scope_tags, prior_fingerprint).await;
        if let (Ok(response), Ok(metrics)) = (&result, crate::telemetry::METRICS.as_ref()) {
            let fingerprint_matched = prior_fingerprint == Some(&response.fingerprint);
            metrics.record_sync(fingerprint_matched, started.elapsed().as_secs_f64());
        }
        result
    }

    async fn sync_inner(
        &self,
        scope_tags: &[String],
        prior_fingerprint: Option<&Fingerprint>,
    ) -> Result<SyncResponse, SyncError> {
        let rules = self.store.list_active(scope_tags).await?;
        let stamps: Vec<(tk_core::identity::RuleId, Timestamp)> =
            rules.iter().map(|r| (r.id, r.modified_at)).collect();
        let fingerprint = compute_fingerprint(&stamps);

        if prior_fingerprint == Some(&fingerprint) {
            return Ok(SyncResponse {
                fingerprint,
                rules: Vec::new(),
            });
        }

        Ok(SyncResponse { fingerprint, rules })
    }
}
