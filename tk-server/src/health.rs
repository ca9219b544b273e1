//! Liveness and readiness probes, exposed as a small axum router alongside
//! `/metrics`. Liveness only checks the process is up; readiness checks the
//! rule store and event sink are reachable within the configured deadline.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tk_store::{EventSink, RuleStore};

use crate::telemetry::metrics_handler;

#[derive(Clone)]
pub struct HealthState<RS, ES> {
    pub rule_store: Arc<RS>,
    pub event_sink: Arc<ES>,
    pub probe_deadline: Duration,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    checks: Vec<CheckResult>,
}

#[derive(Serialize)]
struct CheckResult {
    name: &'static str,
    healthy: bool,
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

async fn readiness<RS, ES>(State(state): State<HealthState<RS, ES>>) -> (StatusCode, Json<HealthBody>)
where
    RS: RuleStore + 'static,
    ES: EventSink + 'static,
{
    let rule_store_ok = tokio::time::timeout(state.probe_deadline, state.rule_store.health_check())
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);

    let event_sink_ok = tokio::time::timeout(state.probe_deadline, state.event_sink.health_check())
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);

    let healthy = rule_store_ok && event_sink_ok;
    let status = if healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (
        status,
        Json(HealthBody {
            status: if healthy { "healthy" } else { "unhealthy" },
            checks: vec![
                CheckResult { name: "rule_store", healthy: rule_store_ok },
                CheckResult { name: "event_sink", healthy: event_sink_ok },
            ],
        }),
    )
}

pub fn router<RS, ES>(state: HealthState<RS, ES>) -> Router
where
    RS: RuleStore + 'static,
    ES: EventSink + 'static,
{
    Router::new()
        .route("/healthz", get(liveness))
        .route("/readyz", get(readiness::<RS, ES>))
        .route("/metrics", get(metrics_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::new().allow_methods([axum::http::Method::GET]))
        .with_state(state)
}
