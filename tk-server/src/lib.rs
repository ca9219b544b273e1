//! Rule sync and event ingestion server: gRPC services, HMAC
//! authentication, and a small health/metrics surface.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod grpc;
pub mod health;
pub mod ingest;
pub mod sync;
pub mod telemetry;
