//! Server side of the event ingestion protocol: per-event
//! validation, persistence, and partial-batch result reporting.

use std::str::FromStr;
use std::sync::Arc;

use tk_core::identity::{compute_content_hash, EntityIdType, EventId, SensorId, TenantId, Timestamp};
use tk_store::{EventRecord, EventSink};

use crate::constants::{
    MAX_METADATA_KEY_BYTES, MAX_METADATA_PAIRS, MAX_METADATA_TOTAL_BYTES,
    MAX_METADATA_VALUE_BYTES, RESERVED_METADATA_PREFIX,
};

/// One event as submitted by a sensor, before validation. `event_id` is
/// carried as the raw submitted string so every outcome can echo exactly
/// what the sensor sent, even when it turns out to be malformed.
pub struct IncomingEvent {
    pub event_id: String,
    pub client_timestamp: Timestamp,
    pub payload: serde_json::Value,
    pub metadata: std::collections::BTreeMap<String, String>,
}

/// Outcome for a single event in a batch, in submission order. Every variant
/// echoes the submitted `event_id` so callers can match results back to
/// their request.
pub enum EventOutcome {
    Accepted { event_id: String },
    Rejected { event_id: String, reason: String },
    Error { event_id: String, retryable: bool, message: String },
}

pub struct BatchResult {
    pub accepted_count: usize,
    pub rejected_count: usize,
    pub outcomes: Vec<EventOutcome>,
}

fn validate_metadata(
    metadata: &std::collections::BTreeMap<String, String>,
) -> Result<(), String> {
    if metadata.len() > MAX_METADATA_PAIRS {
        return Err(format!("metadata has {} pairs, max {}", metadata.len(), MAX_METADATA_PAIRS));
    }
    let mut total = 0usize;
    for (k, v) in metadata {
        if k.starts_with(RESERVED_METADATA_PREFIX) {
            return Err(format!("metadata key {k:?} uses reserved prefix"));
        }
        if k.len() > MAX_METADATA_KEY_BYTES {
            return Err(format!("metadata key {k:?} exceeds {MAX_METADATA_KEY_BYTES} bytes"));
        }
        if v.len() > MAX_METADATA_VALUE_BYTES {
            return Err(format!("metadata value for {k:?} exceeds {MAX_METADATA_VALUE_BYTES} bytes"));
        }
        total += k.len() + v.len();
    }
    if total > MAX_METADATA_TOTAL_BYTES {
        return Err(format!("metadata totals {total} bytes, max {MAX_METADATA_TOTAL_BYTES}"));
    }
    Ok(())
}

pub struct EventIngestionService<S> {
    sink: Arc<S>,
}

impl<S: EventSink> EventIngestionService<S> {
    pub fn new(sink: Arc<S>) -> Self {
        Self { sink }
    }

    /// Validates and persists a batch, preserving submission order in the
    /// result list. A single event's persistence failure never aborts the
    /// rest of the batch.
    pub async fn ingest_batch(
        &self,
        tenant_id: TenantId,
        sensor_id: SensorId,
        events: Vec<IncomingEvent>,
    ) -> BatchResult {
        let started = std::time::Instant::now();
        let mut outcomes = Vec::with_capacity(events.len());
        let mut accepted_count = 0;
        let mut rejected_count = 0;
        let mut error_count = 0;

        for event in events {
            let event_id_str = event.event_id.clone();

            if event.payload.is_null() {
                rejected_count += 1;
                outcomes.push(EventOutcome::Rejected {
                    event_id: event_id_str,
                    reason: "payload is missing".to_string(),
                });
                continue;
            }

            if let Err(reason) = validate_metadata(&event.metadata) {
                rejected_count += 1;
                outcomes.push(EventOutcome::Rejected { event_id: event_id_str, reason });
                continue;
            }

            let event_id = match EventId::from_str(&event.event_id) {
                Ok(id) => id,
                Err(e) => {
                    rejected_count += 1;
                    outcomes.push(EventOutcome::Rejected {
                        event_id: event_id_str,
                        reason: format!("malformed event_id: {e}"),
                    });
                    continue;
                }
            };

            let payload_bytes = serde_json::to_vec(&event.payload).unwrap_or_default();
            let payload_hash = compute_content_hash(&payload_bytes);
            let record = EventRecord {
                event_id,
                tenant_id,
                sensor_id,
                client_timestamp: event.client_timestamp,
                server_received_at: chrono::Utc::now(),
                payload: event.payload,
                metadata: event
                    .metadata
                    .into_iter()
                    .map(|(k, v)| (k, serde_json::Value::String(v)))
                    .collect(),
                payload_hash,
                matched_rule_count: 0,
            };

            match self.sink.append(&record).await {
                Ok(_) => {
                    accepted_count += 1;
                    outcomes.push(EventOutcome::Accepted { event_id: event_id_str });
                }
                Err(err) => {
                    error_count += 1;
                    outcomes.push(EventOutcome::Error {
                        event_id: event_id_str,
                        retryable: err.is_retryable(),
                        message: err.to_string(),
                    });
                }
            }
        }

        if let Ok(metrics) = crate::telemetry::METRICS.as_ref() {
            metrics.record_event("accepted", accepted_count);
            metrics.record_event("rejected", rejected_count);
            metrics.record_event("error", error_count);
            metrics.record_ingest_batch(started.elapsed().as_secs_f64());
        }

        BatchResult {
            accepted_count,
            rejected_count,
            outcomes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tk_store::InMemoryEventSink;

    fn incoming(payload: serde_json::Value) -> IncomingEvent {
        IncomingEvent {
            event_id: EventId::now_v7().to_string(),
            client_timestamp: chrono::Utc::now(),
            payload,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn partial_batch_reports_accept_and_reject_in_order() {
        let sink = Arc::new(InMemoryEventSink::new());
        let service = EventIngestionService::new(sink.clone());

        let events = vec![
            incoming(serde_json::json!({"a": 1})),
            incoming(serde_json::Value::Null),
            incoming(serde_json::json!({"b": 2})),
        ];
        let submitted_ids: Vec<String> = events.iter().map(|e| e.event_id.clone()).collect();

        let result = service
            .ingest_batch(TenantId::now_v7(), SensorId::now_v7(), events)
            .await;

        assert_eq!(result.accepted_count, 2);
        assert_eq!(result.rejected_count, 1);
        assert!(matches!(result.outcomes[0], EventOutcome::Accepted { .. }));
        assert!(matches!(result.outcomes[1], EventOutcome::Rejected { .. }));
        assert!(matches!(result.outcomes[2], EventOutcome::Accepted { .. }));
        assert_eq!(sink.events().len(), 2);

        for (outcome, submitted_id) in result.outcomes.iter().zip(&submitted_ids) {
            let echoed = match outcome {
                EventOutcome::Accepted { event_id } => event_id,
                EventOutcome::Rejected { event_id, .. } => event_id,
                EventOutcome::Error { event_id, .. } => event_id,
            };
            assert_eq!(echoed, submitted_id);
        }
    }

    #[tokio::test]
    async fn malformed_event_id_is_rejected_and_echoed() {
        let sink = Arc::new(InMemoryEventSink::new());
        let service = EventIngestionService::new(sink);

        let mut event = incoming(serde_json::json!({"a": 1}));
        event.event_id = "not-a-uuid".to_string();

        let result = service
            .ingest_batch(TenantId::now_v7(), SensorId::now_v7(), vec![event])
            .await;

        assert_eq!(result.rejected_count, 1);
        match &result.outcomes[0] {
            EventOutcome::Rejected { event_id, .. } => assert_eq!(event_id, "not-a-uuid"),
            _ => panic!("expected a rejection"),
        }
    }

    #[tokio::test]
    async fn reserved_metadata_prefix_is_rejected() {
        let sink = Arc::new(InMemoryEventSink::new());
        let service = EventIngestionService::new(sink);

        let mut event = incoming(serde_json::json!({"a": 1}));
        event.metadata.insert("$tk.client_ip".to_string(), "1.2.3.4".to_string());

        let result = service
            .ingest_batch(TenantId::now_v7(), SensorId::now_v7(), vec![event])
            .await;

        assert_eq!(result.rejected_count, 1);
    }
}
