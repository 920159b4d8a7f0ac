//! JSON-RPC 2.0 request and response types.
//!
//! The dispatcher treats `params`, `result` and `error.data` as opaque JSON;
//! only the `id` field is interpreted.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Protocol version tag written on every outgoing request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Correlation key linking a request to its response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    String(String),
}

impl RequestId {
    /// Extract the identifier of a raw JSON-RPC object, if it carries a usable one.
    ///
    /// `null`, negative or fractional numbers and non-scalar ids yield `None`.
    pub fn from_object(object: &Value) -> Option<Self> {
        match object.get("id")? {
            Value::Number(n) => n.as_u64().map(Self::Number),
            Value::String(s) => Some(Self::String(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "\"{s}\""),
        }
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self::Number(id)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::String(id.to_string())
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self::String(id)
    }
}

/// JSON-RPC 2.0 request object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version (always "2.0" for requests built here).
    pub jsonrpc: String,
    /// Method name to invoke.
    pub method: String,
    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Value>,
    /// Request ID. Left empty to let the dispatcher assign one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RequestId>,
}

impl Request {
    /// Build a request without an identifier.
    pub fn new(method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            method: method.into(),
            params,
            id: None,
        }
    }

    /// Attach a caller-supplied identifier.
    pub fn with_id(mut self, id: impl Into<RequestId>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("RPC error {code}: {message}")]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Additional error data (optional).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

/// Why a response object could not be turned into a [`Response`].
#[derive(Debug, Error)]
pub enum ResponseParseError {
    #[error("response carries both result and error")]
    BothResultAndError,
    #[error("response carries neither result nor error")]
    MissingPayload,
    #[error("invalid response object: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// JSON-RPC 2.0 response: an identifier plus exactly one of result or error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireResponse", into = "WireResponse")]
pub struct Response {
    /// Protocol version echoed by the server.
    pub jsonrpc: String,
    /// Identifier of the request this answers.
    pub id: RequestId,
    /// Success payload or the server's error object.
    pub payload: Result<Value, RpcError>,
}

impl Response {
    /// Create a success response.
    pub fn success(id: impl Into<RequestId>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            payload: Ok(result),
        }
    }

    /// Create an error response.
    pub fn failure(id: impl Into<RequestId>, error: RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            payload: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.payload.is_ok()
    }

    /// Consume the response, keeping only its payload.
    pub fn into_result(self) -> Result<Value, RpcError> {
        self.payload
    }

    /// Parse one element of a transport reply.
    pub fn from_value(value: Value) -> Result<Self, ResponseParseError> {
        let wire: WireResponse = serde_json::from_value(value)?;
        Self::try_from(wire)
    }
}

/// Serde shape of a response on the wire.
#[derive(Serialize, Deserialize)]
struct WireResponse {
    #[serde(default = "default_version")]
    jsonrpc: String,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: RequestId,
}

fn default_version() -> String {
    JSONRPC_VERSION.to_string()
}

/// Keeps `"result": null` distinguishable from an absent `result`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl TryFrom<WireResponse> for Response {
    type Error = ResponseParseError;

    fn try_from(wire: WireResponse) -> Result<Self, Self::Error> {
        let payload = match (wire.result, wire.error) {
            (Some(result), None) => Ok(result),
            (None, Some(error)) => Err(error),
            (Some(_), Some(_)) => return Err(ResponseParseError::BothResultAndError),
            (None, None) => return Err(ResponseParseError::MissingPayload),
        };
        Ok(Self {
            jsonrpc: wire.jsonrpc,
            id: wire.id,
            payload,
        })
    }
}

impl From<Response> for WireResponse {
    fn from(response: Response) -> Self {
        let (result, error) = match response.payload {
            Ok(result) => (Some(result), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            jsonrpc: response.jsonrpc,
            result,
            error,
            id: response.id,
        }
    }
}
