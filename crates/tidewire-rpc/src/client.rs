//! HTTP transport for JSON-RPC endpoints.
//!
//! POSTs each envelope as a JSON body and parses the JSON reply. Authentication
//! is sent via the `Authorization: Bearer <token>` HTTP header when configured.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::transport::{Transport, TransportError};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport that talks to a JSON-RPC endpoint over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    /// Endpoint URL.
    url: String,
    /// Auth token to include in every request.
    auth_token: String,
    /// HTTP client.
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport for the given endpoint URL.
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        Ok(Self {
            url: url.into(),
            auth_token: String::new(),
            client: build_client(DEFAULT_TIMEOUT)?,
        })
    }

    /// Set the bearer token sent with every request.
    pub fn with_token(mut self, auth_token: impl Into<String>) -> Self {
        self.auth_token = auth_token.into();
        self
    }

    /// Set the timeout for each HTTP exchange.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, TransportError> {
        self.client = build_client(timeout)?;
        Ok(self)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn headers(&self) -> Result<HeaderMap, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if !self.auth_token.is_empty() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", self.auth_token))
                    .map_err(|e| TransportError::InvalidHeader(e.to_string()))?,
            );
        }
        Ok(headers)
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, envelope: Value) -> Result<Value, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers()?)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else if e.is_connect() {
                    TransportError::Connection(e.to_string())
                } else {
                    TransportError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }

        let reply = response.bytes().await?;
        Ok(serde_json::from_slice(&reply)?)
    }
}
