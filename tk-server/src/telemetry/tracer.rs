//! Structured logging initialization via `tracing`/`tracing-subscriber`.
//!
//! OTLP export is out of scope for this layer; rules do not
//! recover from fatal config errors and neither does telemetry init, so this
//! returns a `Result` the composition root can fail fast on.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: std::env::var("TRAPPERKEEPER_SERVICE_NAME")
                .unwrap_or_else(|_| "tk-server".to_string()),
            json_logs: std::env::var("TRAPPERKEEPER_JSON_LOGS")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

pub fn init_tracer(config: &TelemetryConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json_logs {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    }
}
