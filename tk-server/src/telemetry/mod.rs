//! Observability: structured logging and Prometheus metrics.

pub mod metrics;
pub mod tracer;

pub use metrics::{metrics_handler, ServerMetrics, METRICS};
pub use tracer::{init_tracer, TelemetryConfig};
