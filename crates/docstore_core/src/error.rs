//! Error types for store operations.

use docstore_codec::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Result type for facade operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;

/// Errors surfaced by [`DocumentStore`](crate::DocumentStore).
#[derive(Error, Debug)]
pub enum StoreError {
    /// Dialing or pinging the server did not succeed.
    #[error("connection failed: {source}")]
    ConnectionFailed {
        /// Underlying cause.
        source: BackendError,
    },

    /// The caller's payload could not be converted. No call was made.
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] CodecError),

    /// The backend call failed (network, timeout, cancellation, rejection).
    #[error("{operation} failed: {source}")]
    OperationFailed {
        /// Facade operation that was running.
        operation: &'static str,
        /// Underlying cause.
        source: BackendError,
    },

    /// A multi-document fetch failed partway through; partial results
    /// were discarded.
    #[error("cursor iteration failed after {fetched} documents: {source}")]
    CursorIteration {
        /// Documents decoded before the failure.
        fetched: usize,
        /// Underlying cause.
        source: BackendError,
    },

    /// A single-document lookup matched nothing.
    #[error("no document matched the filter")]
    NotFound,

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl StoreError {
    pub(crate) fn operation(operation: &'static str, source: BackendError) -> Self {
        Self::OperationFailed { operation, source }
    }

    /// Returns the backend cause, if there is one.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            StoreError::ConnectionFailed { source }
            | StoreError::OperationFailed { source, .. }
            | StoreError::CursorIteration { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns true if this error is a single-document miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    /// Returns true if the call ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self.backend_error(), Some(BackendError::Timeout(_)))
    }

    /// Returns true if the caller cancelled the call.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.backend_error(), Some(BackendError::Cancelled))
    }
}

/// Errors raised by a [`StoreBackend`](crate::StoreBackend).
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// Error reported by the MongoDB driver.
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    /// The operation budget ran out.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// The caller's context was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// The backend is disconnected.
    #[error("not connected to server")]
    NotConnected,

    /// The server refused the request.
    #[error("server rejected the request: {0}")]
    Rejected(String),
}

impl BackendError {
    /// Creates a rejection error.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}
