//! Conversion between sealed batches and transport payloads.

use serde_json::Value;
use thiserror::Error;

use crate::assembler::Batch;

/// A transport reply that is neither a response object nor an array of them.
#[derive(Debug, Error)]
#[error("unexpected reply envelope: expected object or array, got {0}")]
pub struct EnvelopeError(&'static str);

/// Encode a batch for the transport.
///
/// Batches sealed under the no-batching policy travel as a bare object, all
/// others as an array, even when they hold a single request.
pub fn encode(batch: &Batch) -> Result<Value, serde_json::Error> {
    match (batch.is_single(), batch.requests()) {
        (true, [request]) => serde_json::to_value(request),
        (_, requests) => requests
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
    }
}

/// Split a transport reply into its response elements.
pub fn split_reply(reply: Value) -> Result<Vec<Value>, EnvelopeError> {
    match reply {
        Value::Array(elements) => Ok(elements),
        Value::Object(_) => Ok(vec![reply]),
        Value::Null => Err(EnvelopeError("null")),
        Value::Bool(_) => Err(EnvelopeError("boolean")),
        Value::Number(_) => Err(EnvelopeError("number")),
        Value::String(_) => Err(EnvelopeError("string")),
    }
}
