//! Sensor facade: the single entry point embedded in client workloads.
//!
//! `observe` is synchronous and never performs network I/O beyond the
//! auto-flush the buffer itself triggers; `sync` and `flush` are the only
//! methods that talk to the control plane.

use std::collections::BTreeMap;

use serde_json::Value;

use tk_core::clock::Clock;
use tk_core::compiler::CompiledRule;
use tk_core::eval::{evaluate_rule_set, RuleMatch};
use tk_core::identity::{RuleId, SensorId};
use tk_core::rng::RandomSource;
use tk_core::rule::Action;
use tk_proto::{
    GetDiagnosticsRequest, MetadataEntry, ReportEventsRequest, SyncRulesRequest, ToProtoTimestamp,
};

use crate::buffer::{BufferCaps, BufferedEvent, EventBuffer, PushOutcome};
use crate::cache::RuleCache;
use crate::client::SensorClient;
use crate::error::{SdkError, TransportError};
use crate::failmode::FailureMode;

/// Static configuration for one sensor instance.
pub struct SensorConfig {
    pub sensor_id: SensorId,
    pub scope_tags: Vec<String>,
    pub failure_mode: FailureMode,
    pub cache_ttl: Option<std::time::Duration>,
    pub buffer_caps: BufferCaps,
}

/// The outcome of a `flush`: what the server accepted, rejected, or erred on.
#[derive(Debug, Clone)]
pub struct FlushResult {
    pub accepted_count: u32,
    pub rejected_count: u32,
}

pub struct Sensor<C, R> {
    client: SensorClient,
    config: SensorConfig,
    cache: RuleCache,
    buffer: EventBuffer,
    last_sync_failed: bool,
    clock: C,
    rng: R,
}

impl<C: Clock, R: RandomSource> Sensor<C, R> {
    pub fn new(client: SensorClient, config: SensorConfig, clock: C, rng: R) -> Self {
        let cache = RuleCache::new(config.cache_ttl);
        let buffer = EventBuffer::new(config.buffer_caps);
        Self { client, config, cache, buffer, last_sync_failed: false, clock, rng }
    }

    /// Whether the next `observe` should be preceded by a `sync`: no cache
    /// yet, or the cached snapshot has exceeded its TTL.
    pub fn needs_sync(&self) -> bool {
        self.cache.current().is_none() || self.cache.is_stale(self.clock.now())
    }

    /// Fetch and compile the active, in-scope rule set. A rule that fails
    /// to recompile (a defensive check; it was already validated when
    /// authored) is dropped with a logged warning rather than failing the
    /// whole sync.
    pub async fn sync(&mut self) -> Result<(), TransportError> {
        let prior_fingerprint = self.cache.fingerprint().map(|f| f.0.clone());
        let request = SyncRulesRequest { tags: self.config.scope_tags.clone(), prior_fingerprint };

        let result = self.client.sync_rules(request).await;
        match result {
            Ok(response) => {
                self.last_sync_failed = false;
                let now = self.clock.now();
                if response.rules.is_empty() {
                    self.cache.touch(now);
                    return Ok(());
                }
                let compiled: Vec<CompiledRule> = response
                    .rules
                    .iter()
                    .filter_map(|proto_rule| match tk_proto::convert::rule_from_proto(proto_rule) {
                        Ok(rule) => match tk_core::compiler::compile(&rule) {
                            Ok((compiled, _warnings)) => Some(compiled),
                            Err(err) => {
                                tracing::warn!(rule_id = %rule.id, error = %err, "dropping rule that failed to recompile");
                                None
                            }
                        },
                        Err(err) => {
                            tracing::warn!(error = %err, "dropping malformed rule from sync response");
                            None
                        }
                    })
                    .collect();
                self.cache.replace(tk_core::Fingerprint(response.fingerprint), compiled, now);
                Ok(())
            }
            Err(err) => {
                self.last_sync_failed = true;
                Err(err)
            }
        }
    }

    /// Evaluate one record against the cached rule set, applying the
    /// configured failure mode if the cache is absent or the last sync
    /// failed. Matches are buffered for the next (possibly auto-triggered)
    /// flush.
    pub fn observe(&mut self, record: &Value) -> Result<Vec<RuleMatch>, SdkError> {
        let matches = if self.last_sync_failed || self.cache.current().is_none() {
            self.degraded_matches(record)?
        } else {
            let entry = self.cache.current().expect("checked above");
            evaluate_rule_set(&entry.rules, &self.config.scope_tags, record, &self.clock, &mut self.rng)?
        };

        for m in &matches {
            self.buffer_match(record, m);
        }
        Ok(matches)
    }

    fn degraded_matches(&mut self, record: &Value) -> Result<Vec<RuleMatch>, SdkError> {
        match self.config.failure_mode {
            FailureMode::FailSafe => match self.cache.current() {
                Some(entry) => Ok(evaluate_rule_set(
                    &entry.rules,
                    &self.config.scope_tags,
                    record,
                    &self.clock,
                    &mut self.rng,
                )?),
                None => Ok(Vec::new()),
            },
            FailureMode::FailClosed => {
                let drop_rule_ids: Vec<RuleId> = self
                    .cache
                    .current()
                    .map(|entry| {
                        entry
                            .rules
                            .iter()
                            .filter(|r| r.rule.is_active() && r.rule.action == Action::Drop)
                            .map(|r| r.rule.id)
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(self.config.failure_mode.fail_closed_matches(&drop_rule_ids, record))
            }
            FailureMode::FailOpen => Ok(Vec::new()),
        }
    }

    fn buffer_match(&mut self, record: &Value, m: &RuleMatch) {
        let mut metadata = BTreeMap::new();
        metadata.insert("matched_rule_id".to_string(), m.rule_id.to_string());
        metadata.insert(
            "matched_condition".to_string(),
            format!("[\"{}\",{},\"{}\"]", m.matched_condition.tag, m.matched_condition.group_index, m.matched_condition.quantifier),
        );
        metadata.insert("matched_field".to_string(), m.matched_field.to_string());
        metadata.insert("matched_value".to_string(), m.matched_value.to_string());

        match self.buffer.push(self.clock.now(), record.clone(), metadata) {
            Ok(PushOutcome::Buffered) => {}
            Ok(PushOutcome::CapReached) => self.inline_flush(),
            Err(err) => {
                tracing::warn!(error = %err, "dropping event that exceeds the per-event byte cap");
            }
        }
    }

    /// The synchronous inline flush performed when a buffer cap is
    /// reached. `observe` stays a plain synchronous call by blocking the
    /// current worker thread on the async RPC via `block_in_place`; this
    /// requires a multi-threaded Tokio runtime. Outside one, the overflow
    /// is logged and left buffered for the next explicit `flush()`.
    fn inline_flush(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("buffer cap reached outside a Tokio runtime; deferring to the next explicit flush()");
            return;
        };
        let result = tokio::task::block_in_place(|| handle.block_on(self.flush()));
        if let Err(err) = result {
            tracing::warn!(error = %err, "inline flush on buffer-cap overflow failed");
        }
    }

    /// Transmit whatever is buffered. Safe to call with an empty buffer.
    pub async fn flush(&mut self) -> Result<FlushResult, SdkError> {
        if self.buffer.is_empty() {
            return Ok(FlushResult { accepted_count: 0, rejected_count: 0 });
        }
        let events = self.buffer.drain();
        let request = self.build_report_request(events);

        match self.client.report_events(request).await {
            Ok(response) => Ok(FlushResult {
                accepted_count: response.accepted_count,
                rejected_count: response.rejected_count,
            }),
            Err(err) if err.is_retryable() => {
                Err(SdkError::RetriesExhausted { attempts: crate::client::MAX_RETRY_ATTEMPTS, source: err })
            }
            Err(err) => Err(SdkError::Transport(err)),
        }
    }

    fn build_report_request(&self, events: Vec<BufferedEvent>) -> ReportEventsRequest {
        ReportEventsRequest {
            sensor_id: self.config.sensor_id.to_string(),
            client_timestamp: Some(self.clock.now().to_proto()),
            events: events
                .into_iter()
                .map(|e| tk_proto::Event {
                    event_id: e.event_id.to_string(),
                    client_timestamp: Some(e.client_timestamp.to_proto()),
                    payload_json: serde_json::to_vec(&e.payload).unwrap_or_default(),
                    metadata: e
                        .metadata
                        .into_iter()
                        .map(|(key, value)| MetadataEntry { key, value })
                        .collect(),
                })
                .collect(),
        }
    }

    /// The server's view of this sensor's last known sync state. Distinct
    /// from [`Sensor::local_diagnostics`], which reports the SDK's own live
    /// buffer and cache state without a network round trip.
    pub async fn get_diagnostics(&mut self) -> Result<tk_proto::GetDiagnosticsResponse, TransportError> {
        self.client
            .get_diagnostics(GetDiagnosticsRequest { sensor_id: self.config.sensor_id.to_string() })
            .await
    }

    /// A purely local snapshot of this sensor's state: buffered event
    /// count, synced rule count, last sync time, and active rule ids, all
    /// read straight off the in-process buffer and cache.
    pub fn local_diagnostics(&self) -> LocalDiagnostics {
        let (rules_synced_count, last_sync_time, active_rule_ids) = match self.cache.current() {
            Some(entry) => (
                entry.rules.len(),
                Some(entry.fetched_at),
                entry.rules.iter().map(|r| r.rule.id).collect(),
            ),
            None => (0, None, Vec::new()),
        };
        LocalDiagnostics {
            buffered_events_count: self.buffer.len(),
            rules_synced_count,
            last_sync_time,
            active_rule_ids,
        }
    }
}

/// Sensor-local diagnostics, computed without a network call.
#[derive(Debug, Clone)]
pub struct LocalDiagnostics {
    pub buffered_events_count: usize,
    pub rules_synced_count: usize,
    pub last_sync_time: Option<tk_core::identity::Timestamp>,
    pub active_rule_ids: Vec<RuleId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_sync_when_cache_empty() {
        // constructing a Sensor requires a live Channel, so this only
        // exercises the pure cache-staleness logic via RuleCache directly.
        let cache = RuleCache::new(Some(std::time::Duration::from_secs(60)));
        assert!(cache.current().is_none());
    }
}
