//! Server-level error types and their mapping onto [`tonic::Status`].
//!
//! Errors are grouped by the abstract kinds named in the design: validation,
//! authentication, transient transport/store, persistent store constraint,
//! and fatal configuration. No secret values or raw store errors are ever
//! included in a message that crosses the wire.

use thiserror::Error;
use tk_store::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing authentication credentials")]
    Missing,
    #[error("malformed API key")]
    Malformed,
    #[error("unknown API key")]
    UnknownKey,
    #[error("API key has been revoked")]
    Revoked,
    #[error("signature verification failed")]
    BadSignature,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("event batch was empty")]
    EmptyBatch,
    #[error("event {index} rejected: {reason}")]
    Rejected { index: usize, reason: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Top-level server error, convertible to a [`tonic::Status`] at the gRPC
/// boundary.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),
    #[error("ingestion failed: {0}")]
    Ingest(#[from] IngestError),
    #[error("sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("invalid request: {0}")]
    InvalidArgument(String),
}

impl From<AuthError> for tonic::Status {
    fn from(err: AuthError) -> Self {
        tonic::Status::unauthenticated(err.to_string())
    }
}

impl From<&StoreError> for tonic::Status {
    fn from(err: &StoreError) -> Self {
        if err.is_retryable() {
            tonic::Status::unavailable(err.to_string())
        } else {
            tonic::Status::failed_precondition(err.to_string())
        }
    }
}

impl From<IngestError> for tonic::Status {
    fn from(err: IngestError) -> Self {
        match &err {
            IngestError::EmptyBatch => tonic::Status::invalid_argument(err.to_string()),
            IngestError::Rejected { .. } => tonic::Status::invalid_argument(err.to_string()),
            IngestError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<SyncError> for tonic::Status {
    fn from(err: SyncError) -> Self {
        match &err {
            SyncError::Store(store_err) => store_err.into(),
        }
    }
}

impl From<ServerError> for tonic::Status {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Auth(e) => e.into(),
            ServerError::Ingest(e) => e.into(),
            ServerError::Sync(e) => e.into(),
            ServerError::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}
