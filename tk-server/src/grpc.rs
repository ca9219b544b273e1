//! gRPC service implementation: `SyncRules`, `ReportEvents`, `GetDiagnostics`.
//!
//! Every call is authenticated via the `x-api-key` metadata header before
//! the request reaches the sync/ingest services; the wire representation is
//! defined in `tk-proto` and converted here, never held anywhere else.

use std::sync::Arc;
use std::time::Duration;
use tonic::{Request, Response, Status};

use tk_core::identity::{EntityIdType, SensorId};
use tk_proto::trapper_keeper_server::TrapperKeeper;
use tk_proto::{
    self as proto, FromProtoTimestamp, GetDiagnosticsRequest, GetDiagnosticsResponse,
    ReportEventsRequest, ReportEventsResponse, SyncRulesRequest, SyncRulesResponse,
    ToProtoTimestamp,
};
use tk_store::{EventSink, RuleStore};

use crate::auth::{ApiKeyLookup, Authenticator};
use crate::ingest::{EventIngestionService, IncomingEvent};
use crate::sync::RuleSyncService;

pub struct Service<RS, ES, K> {
    sync: RuleSyncService<RS>,
    ingest: EventIngestionService<ES>,
    auth: Arc<Authenticator<K>>,
    sync_deadline: Duration,
    ingest_deadline: Duration,
}

impl<RS, ES, K> Service<RS, ES, K>
where
    RS: RuleStore,
    ES: EventSink,
    K: ApiKeyLookup,
{
    pub fn new(
        rule_store: Arc<RS>,
        event_sink: Arc<ES>,
        auth: Arc<Authenticator<K>>,
        sync_deadline: Duration,
        ingest_deadline: Duration,
    ) -> Self {
        Self {
            sync: RuleSyncService::new(rule_store),
            ingest: EventIngestionService::new(event_sink),
            auth,
            sync_deadline,
            ingest_deadline,
        }
    }
}

fn require_api_key<T>(request: &Request<T>) -> Result<String, Status> {
    request
        .metadata()
        .get("x-api-key")
        .ok_or_else(|| Status::unauthenticated("missing x-api-key"))?
        .to_str()
        .map(str::to_string)
        .map_err(|_| Status::unauthenticated("malformed x-api-key"))
}

async fn with_deadline<F, T>(deadline: Duration, fut: F) -> Result<T, Status>
where
    F: std::future::Future<Output = Result<T, Status>>,
{
    tokio::time::timeout(deadline, fut)
        .await
        .unwrap_or_else(|_| Err(Status::deadline_exceeded("request exceeded its deadline")))
}

#[tonic::async_trait]
impl<RS, ES, K> TrapperKeeper for Service<RS, ES, K>
where
    RS: RuleStore + 'static,
    ES: EventSink + 'static,
    K: ApiKeyLookup + 'static,
{
    async fn sync_rules(
        &self,
        request: Request<SyncRulesRequest>,
    ) -> Result<Response<SyncRulesResponse>, Status> {
        let full_key = require_api_key(&request)?;
        self.auth
            .authenticate(&full_key, chrono::Utc::now())
            .await
            .map_err(Status::from)?;

        let req = request.into_inner();
        let prior = req.prior_fingerprint.map(tk_core::Fingerprint);

        let result = with_deadline(self.sync_deadline, async {
            self.sync.sync(&req.tags, prior.as_ref()).await.map_err(Status::from)
        })
        .await?;

        Ok(Response::new(SyncRulesResponse {
            rules: result.rules.iter().map(proto::convert::rule_to_proto).collect(),
            fingerprint: result.fingerprint.0,
        }))
    }

    async fn report_events(
        &self,
        request: Request<ReportEventsRequest>,
    ) -> Result<Response<ReportEventsResponse>, Status> {
        let full_key = require_api_key(&request)?;
        let ctx = self
            .auth
            .authenticate(&full_key, chrono::Utc::now())
            .await
            .map_err(Status::from)?;

        let req = request.into_inner();
        let sensor_id = req
            .sensor_id
            .parse::<uuid::Uuid>()
            .map(SensorId::new)
            .map_err(|_| Status::invalid_argument("malformed sensor_id"))?;

        let events = req
            .events
            .into_iter()
            .map(|e| IncomingEvent {
                event_id: e.event_id,
                client_timestamp: e
                    .client_timestamp
                    .as_ref()
                    .map(chrono::DateTime::<chrono::Utc>::from_proto)
                    .unwrap_or_else(chrono::Utc::now),
                payload: serde_json::from_slice(&e.payload_json).unwrap_or(serde_json::Value::Null),
                metadata: e
                    .metadata
                    .into_iter()
                    .map(|m| (m.key, m.value))
                    .collect(),
            })
            .collect();

        let result = with_deadline(self.ingest_deadline, async {
            Ok(self.ingest.ingest_batch(ctx.tenant_id, sensor_id, events).await)
        })
        .await?;

        let results = result
            .outcomes
            .into_iter()
            .map(|outcome| match outcome {
                crate::ingest::EventOutcome::Accepted { event_id } => proto::EventResult {
                    event_id,
                    status: proto::EventStatus::EventStatusAccepted as i32,
                    error_message: None,
                    retryable: false,
                },
                crate::ingest::EventOutcome::Rejected { event_id, reason } => proto::EventResult {
                    event_id,
                    status: proto::EventStatus::EventStatusRejected as i32,
                    error_message: Some(reason),
                    retryable: false,
                },
                crate::ingest::EventOutcome::Error { event_id, retryable, message } => proto::EventResult {
                    event_id,
                    status: proto::EventStatus::EventStatusError as i32,
                    error_message: Some(message),
                    retryable,
                },
            })
            .collect();

        Ok(Response::new(ReportEventsResponse {
            results,
            accepted_count: result.accepted_count as u32,
            rejected_count: result.rejected_count as u32,
        }))
    }

    async fn get_diagnostics(
        &self,
        request: Request<GetDiagnosticsRequest>,
    ) -> Result<Response<GetDiagnosticsResponse>, Status> {
        let full_key = require_api_key(&request)?;
        self.auth
            .authenticate(&full_key, chrono::Utc::now())
            .await
            .map_err(Status::from)?;

        let req = request.into_inner();
        let _sensor_id = req
            .sensor_id
            .parse::<uuid::Uuid>()
            .map(SensorId::new)
            .map_err(|_| Status::invalid_argument("malformed sensor_id"))?;

        let result = with_deadline(self.sync_deadline, async {
            self.sync.sync(&[], None).await.map_err(Status::from)
        })
        .await?;

        Ok(Response::new(GetDiagnosticsResponse {
            buffered_events_count: 0,
            rules_synced_count: result.rules.len() as u32,
            last_sync_time: Some(chrono::Utc::now().to_proto()),
            active_rule_ids: result.rules.iter().map(|r| r.id.to_string()).collect(),
        }))
    }
}
