//! Server configuration, loaded from `TRAPPERKEEPER_`-prefixed environment
//! variables with explicit defaults. Loading never panics: malformed input
//! produces a [`ConfigError`] the caller can log and exit on.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
    #[error("invalid socket address for {var}: {value:?}")]
    InvalidAddr { var: &'static str, value: String },
}

/// Runtime configuration for the sync/ingest server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the gRPC server binds to.
    pub grpc_addr: SocketAddr,

    /// Address the health/metrics HTTP server binds to.
    pub http_addr: SocketAddr,

    /// Postgres connection string. Absent means the in-memory store is used.
    pub database_url: Option<String>,

    /// Maximum pooled database connections per service instance.
    pub db_pool_size: usize,

    /// Deadline applied to a single rule-sync request.
    pub sync_deadline: Duration,

    /// Deadline applied to a single event-ingest request.
    pub ingest_deadline: Duration,

    /// Deadline applied to a single health probe.
    pub health_probe_deadline: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            grpc_addr: "0.0.0.0:7070".parse().expect("valid default addr"),
            http_addr: "0.0.0.0:7071".parse().expect("valid default addr"),
            database_url: None,
            db_pool_size: crate::constants::DEFAULT_DB_POOL_SIZE,
            sync_deadline: crate::constants::SYNC_DEADLINE,
            ingest_deadline: crate::constants::INGEST_DEADLINE,
            health_probe_deadline: crate::constants::HEALTH_PROBE_DEADLINE,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `TRAPPERKEEPER_GRPC_ADDR` (default `0.0.0.0:7070`)
    /// - `TRAPPERKEEPER_HTTP_ADDR` (default `0.0.0.0:7071`)
    /// - `TRAPPERKEEPER_DATABASE_URL` (absent = in-memory store)
    /// - `TRAPPERKEEPER_DB_POOL_SIZE` (default 16)
    /// - `TRAPPERKEEPER_SYNC_DEADLINE_SECS` (default 3)
    /// - `TRAPPERKEEPER_INGEST_DEADLINE_SECS` (default 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let grpc_addr = match std::env::var("TRAPPERKEEPER_GRPC_ADDR") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidAddr {
                var: "TRAPPERKEEPER_GRPC_ADDR",
                value: v,
            })?,
            Err(_) => defaults.grpc_addr,
        };

        let http_addr = match std::env::var("TRAPPERKEEPER_HTTP_ADDR") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidAddr {
                var: "TRAPPERKEEPER_HTTP_ADDR",
                value: v,
            })?,
            Err(_) => defaults.http_addr,
        };

        let database_url = std::env::var("TRAPPERKEEPER_DATABASE_URL").ok();

        let db_pool_size = match std::env::var("TRAPPERKEEPER_DB_POOL_SIZE") {
            Ok(v) => v.parse().map_err(|_| ConfigError::InvalidValue {
                var: "TRAPPERKEEPER_DB_POOL_SIZE",
                value: v,
            })?,
            Err(_) => defaults.db_pool_size,
        };

        let sync_deadline = match std::env::var("TRAPPERKEEPER_SYNC_DEADLINE_SECS") {
            Ok(v) => Duration::from_secs(v.parse().map_err(|_| ConfigError::InvalidValue {
                var: "TRAPPERKEEPER_SYNC_DEADLINE_SECS",
                value: v,
            })?),
            Err(_) => defaults.sync_deadline,
        };

        let ingest_deadline = match std::env::var("TRAPPERKEEPER_INGEST_DEADLINE_SECS") {
            Ok(v) => Duration::from_secs(v.parse().map_err(|_| ConfigError::InvalidValue {
                var: "TRAPPERKEEPER_INGEST_DEADLINE_SECS",
                value: v,
            })?),
            Err(_) => defaults.ingest_deadline,
        };

        Ok(Self {
            grpc_addr,
            http_addr,
            database_url,
            db_pool_size,
            sync_deadline,
            ingest_deadline,
            health_probe_deadline: defaults.health_probe_deadline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_well_formed() {
        let config = ServerConfig::default();
        assert_eq!(config.grpc_addr.port(), 7070);
        assert_eq!(config.db_pool_size, 16);
        assert!(config.database_url.is_none());
    }
}
