//! Thin gRPC client wrapper: connects to the control plane, attaches the
//! `x-api-key` header, and retries `ReportEvents` with exponential backoff
//! on transient failures.

use std::time::Duration;

use tonic::metadata::MetadataValue;
use tonic::transport::Channel;
use tonic::Request;

use tk_proto::trapper_keeper_client::TrapperKeeperClient;
use tk_proto::{
    GetDiagnosticsRequest, GetDiagnosticsResponse, ReportEventsRequest, ReportEventsResponse,
    SyncRulesRequest, SyncRulesResponse,
};

use crate::error::TransportError;

/// Backoff schedule for `ReportEvents`: 1s, 2s, 4s, ..., capped at 60s,
/// for at most this many attempts.
pub(crate) const MAX_RETRY_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

fn backoff_for_attempt(attempt: u32) -> Duration {
    let millis = INITIAL_BACKOFF.as_millis().saturating_mul(1u128 << attempt.min(16));
    Duration::from_millis(millis.min(MAX_BACKOFF.as_millis()) as u64)
}

/// A connected client for one control-plane endpoint, carrying the
/// sensor's API key.
#[derive(Clone)]
pub struct SensorClient {
    inner: TrapperKeeperClient<Channel>,
    api_key: String,
}

impl SensorClient {
    pub async fn connect(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, TransportError> {
        let channel = Channel::from_shared(endpoint.into())
            .map_err(|e| TransportError::Rpc(tonic::Status::invalid_argument(e.to_string())))?
            .connect()
            .await?;
        Ok(Self { inner: TrapperKeeperClient::new(channel), api_key: api_key.into() })
    }

    fn authed<T>(&self, message: T) -> Result<Request<T>, TransportError> {
        let mut request = Request::new(message);
        let value = MetadataValue::try_from(self.api_key.as_str())
            .map_err(|_| TransportError::Rpc(tonic::Status::unauthenticated("malformed api key")))?;
        request.metadata_mut().insert("x-api-key", value);
        Ok(request)
    }

    /// One sync attempt, no retry: sync failures are handled by the
    /// sensor's configured failure mode, not by retry-with-backoff.
    pub async fn sync_rules(&mut self, request: SyncRulesRequest) -> Result<SyncRulesResponse, TransportError> {
        let request = self.authed(request)?;
        Ok(self.inner.sync_rules(request).await?.into_inner())
    }

    /// Submits a batch, retrying the whole batch with exponential backoff
    /// while the failure is transient, up to [`MAX_RETRY_ATTEMPTS`].
    pub async fn report_events(
        &mut self,
        request: ReportEventsRequest,
    ) -> Result<ReportEventsResponse, TransportError> {
        let mut attempt = 0;
        loop {
            let result = match self.authed(request.clone()) {
                Ok(req) => self
                    .inner
                    .report_events(req)
                    .await
                    .map(|r| r.into_inner())
                    .map_err(TransportError::from),
                Err(e) => Err(e),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < MAX_RETRY_ATTEMPTS - 1 => {
                    tracing::warn!(attempt, error = %err, "report_events failed, retrying");
                    tokio::time::sleep(backoff_for_attempt(attempt)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn get_diagnostics(
        &mut self,
        request: GetDiagnosticsRequest,
    ) -> Result<GetDiagnosticsResponse, TransportError> {
        let request = self.authed(request)?;
        Ok(self.inner.get_diagnostics(request).await?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_the_cap() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs(1));
        assert_eq!(backoff_for_attempt(1), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(2), Duration::from_secs(4));
        assert_eq!(backoff_for_attempt(6), Duration::from_secs(60));
        assert_eq!(backoff_for_attempt(20), Duration::from_secs(60));
    }
}
