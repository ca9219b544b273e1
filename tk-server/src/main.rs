//! Entry point: bootstrap telemetry and configuration, wire the rule store
//! and event sink, and serve the gRPC sync/ingest API alongside an axum
//! health/metrics endpoint.

use std::sync::Arc;

use tk_core::identity::EntityIdType;
use tk_server::auth::{Authenticator, HmacSecret, InMemoryApiKeyLookup};
use tk_server::config::ServerConfig;
use tk_server::grpc::Service;
use tk_server::health;
use tk_server::telemetry::{init_tracer, TelemetryConfig};
use tk_store::{EventSink, InMemoryEventSink, InMemoryRuleStore, RuleStore};

#[cfg(feature = "postgres")]
async fn connect_postgres(
    database_url: &str,
    pool_size: usize,
) -> Result<deadpool_postgres::Pool, Box<dyn std::error::Error>> {
    let pg_config: tokio_postgres::Config = database_url.parse()?;
    let manager = deadpool_postgres::Manager::from_config(
        pg_config,
        tokio_postgres::NoTls,
        deadpool_postgres::ManagerConfig { recycling_method: deadpool_postgres::RecyclingMethod::Fast },
    );
    let pool = deadpool_postgres::Pool::builder(manager).max_size(pool_size).build()?;
    Ok(pool)
}

async fn build_stores(
    config: &ServerConfig,
) -> Result<(Arc<dyn RuleStore>, Arc<dyn EventSink>), Box<dyn std::error::Error>> {
    #[cfg(feature = "postgres")]
    if let Some(database_url) = &config.database_url {
        let pool = connect_postgres(database_url, config.db_pool_size).await?;
        tracing::info!("using Postgres-backed stores");
        return Ok((
            Arc::new(tk_store::PostgresRuleStore::new(pool.clone())),
            Arc::new(tk_store::PostgresEventSink::new(pool)),
        ));
    }
    #[cfg(not(feature = "postgres"))]
    if config.database_url.is_some() {
        tracing::warn!(
            "TRAPPERKEEPER_DATABASE_URL is set but this binary was built without the postgres feature; using in-memory stores"
        );
    }

    tracing::info!("using in-memory stores");
    Ok((Arc::new(InMemoryRuleStore::new()), Arc::new(InMemoryEventSink::new())))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let telemetry_config = TelemetryConfig::default();
    init_tracer(&telemetry_config).ok();

    let config = ServerConfig::from_env()?;
    tracing::info!(grpc_addr = %config.grpc_addr, http_addr = %config.http_addr, "starting");

    // Fatal config: at least one HMAC secret is required to authenticate
    // any sensor.
    let secret_bytes = std::env::var("TRAPPERKEEPER_HMAC_SECRET")
        .map_err(|_| "TRAPPERKEEPER_HMAC_SECRET must be set: no HMAC secret configured")?;
    let secret_id = tk_core::identity::HmacSecretId::now_v7();
    let secret = HmacSecret {
        secret_id,
        secret_bytes: secret_bytes.into_bytes(),
    };

    let (rule_store, event_sink) = build_stores(&config).await?;
    let keys = InMemoryApiKeyLookup::new();
    let auth = Arc::new(Authenticator::new([secret], keys));

    let grpc_service = Service::new(
        rule_store.clone(),
        event_sink.clone(),
        auth,
        config.sync_deadline,
        config.ingest_deadline,
    );

    let health_state = health::HealthState {
        rule_store: rule_store.clone(),
        event_sink: event_sink.clone(),
        probe_deadline: config.health_probe_deadline,
    };

    // Outer safety net in front of the per-RPC deadlines enforced inside
    // `grpc::Service`: catches a request stuck before it ever reaches a handler.
    let outer_timeout = config.ingest_deadline.max(config.sync_deadline) + std::time::Duration::from_secs(1);

    let grpc_server = tonic::transport::Server::builder()
        .layer(tower::timeout::TimeoutLayer::new(outer_timeout))
        .add_service(tk_proto::trapper_keeper_server::TrapperKeeperServer::new(grpc_service))
        .serve(config.grpc_addr);

    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    let http_server = axum::serve(http_listener, health::router(health_state));

    tokio::select! {
        result = grpc_server => {
            result?;
        }
        result = http_server => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
