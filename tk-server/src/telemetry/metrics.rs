//! Prometheus metrics for sync, ingestion, and authentication.
//!
//! Exposed on `/metrics` in Prometheus text format.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder};

const RPC_LATENCY_BUCKETS: &[f64] = &[0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 3.0];

/// Global metrics instance, initialized once at startup.
pub static METRICS: Lazy<Result<ServerMetrics, prometheus::Error>> = Lazy::new(ServerMetrics::new);

#[derive(Clone)]
pub struct ServerMetrics {
    /// Rule-sync requests, labeled by outcome (hit = fingerprint unchanged, miss = full set returned).
    pub sync_requests_total: CounterVec,
    pub sync_duration_seconds: HistogramVec,

    /// Ingested events, labeled by outcome (accepted, rejected, error).
    pub events_total: CounterVec,
    pub ingest_duration_seconds: HistogramVec,

    /// Authentication attempts, labeled by outcome.
    pub auth_attempts_total: CounterVec,
}

impl ServerMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            sync_requests_total: register_counter_vec!(
                "trapperkeeper_sync_requests_total",
                "Total rule-sync requests",
                &["outcome"]
            )?,
            sync_duration_seconds: register_histogram_vec!(
                "trapperkeeper_sync_duration_seconds",
                "Rule-sync request duration in seconds",
                &["outcome"],
                RPC_LATENCY_BUCKETS.to_vec()
            )?,
            events_total: register_counter_vec!(
                "trapperkeeper_events_total",
                "Total ingested events",
                &["outcome"]
            )?,
            ingest_duration_seconds: register_histogram_vec!(
                "trapperkeeper_ingest_duration_seconds",
                "Event-ingestion batch duration in seconds",
                &[],
                RPC_LATENCY_BUCKETS.to_vec()
            )?,
            auth_attempts_total: register_counter_vec!(
                "trapperkeeper_auth_attempts_total",
                "Total authentication attempts",
                &["outcome"]
            )?,
        })
    }

    pub fn record_sync(&self, fingerprint_matched: bool, duration_secs: f64) {
        let outcome = if fingerprint_matched { "hit" } else { "miss" };
        self.sync_requests_total.with_label_values(&[outcome]).inc();
        self.sync_duration_seconds
            .with_label_values(&[outcome])
            .observe(duration_secs);
    }

    pub fn record_event(&self, outcome: &str, count: usize) {
        if count > 0 {
            self.events_total.with_label_values(&[outcome]).inc_by(count as f64);
        }
    }

    pub fn record_ingest_batch(&self, duration_secs: f64) {
        self.ingest_duration_seconds.with_label_values(&[]).observe(duration_secs);
    }

    pub fn record_auth_attempt(&self, outcome: &str) {
        self.auth_attempts_total.with_label_values(&[outcome]).inc();
    }
}

pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_register_without_error() {
        let metrics = METRICS.as_ref().expect("metrics registration");
        metrics.record_sync(true, 0.005);
        metrics.record_event("accepted", 3);
        metrics.record_auth_attempt("ok");
    }
}
