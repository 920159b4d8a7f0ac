//! Errors delivered to callers through their response handles.

use thiserror::Error;

use tidewire_core::types::RequestId;

/// Terminal failure of a dispatched request.
///
/// `Clone` because one batch-level failure is fanned out to every request of
/// the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// Another pending request already uses this identifier.
    #[error("duplicate request identifier {0}")]
    DuplicateIdentifier(RequestId),
    /// The dispatcher requires caller-supplied identifiers and none was given.
    #[error("request has no identifier")]
    MissingIdentifier,
    /// The dispatcher was shut down before the request completed.
    #[error("dispatcher is closed")]
    DispatcherClosed,
    /// The batch carrying the request failed as a whole.
    #[error("transport failure: {0}")]
    TransportFailure(String),
    /// The reply for this request could not be parsed.
    #[error("malformed response for request {id}: {reason}")]
    MalformedResponse { id: RequestId, reason: String },
    /// No reply arrived within the configured request timeout.
    #[error("request {0} timed out")]
    Timeout(RequestId),
}
