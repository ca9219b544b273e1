//! Error types for the sensor-side SDK.

use thiserror::Error;

/// Failure transmitting to, or syncing rules from, the control plane.
///
/// Both `sync` and `flush` RPCs surface through this type; the distinction
/// between retryable and fatal drives the retry loop in [`crate::client`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("rpc failed: {0}")]
    Rpc(#[from] tonic::Status),
}

impl TransportError {
    /// Whether the sensor should retry the call with backoff. Auth and
    /// validation failures are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Transport(_) => true,
            TransportError::Rpc(status) => matches!(
                status.code(),
                tonic::Code::Unavailable
                    | tonic::Code::DeadlineExceeded
                    | tonic::Code::ResourceExhausted
            ),
        }
    }
}

/// Errors surfaced to the embedding host by the sensor facade.
#[derive(Debug, Error)]
pub enum SdkError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("rule compiled from the wire failed validation: {0}")]
    Compile(#[from] tk_core::CompileError),

    #[error("record evaluation failed: {0}")]
    Eval(#[from] tk_core::EvalError),

    #[error(transparent)]
    Convert(#[from] tk_proto::ConvertError),

    #[error("exceeded {attempts} retry attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}
