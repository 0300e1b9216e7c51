//! HTTP transport abstraction.
//!
//! The client never talks to the network directly. It hands a
//! [`TransportRequest`] to an [`HttpTransport`] and interprets the status
//! code and body that come back. Connection pooling, TLS and timeouts
//! belong to the transport.

#[cfg(feature = "reqwest-transport")]
mod http;

#[cfg(feature = "reqwest-transport")]
pub use http::ReqwestTransport;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// HTTP method used for data queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// `GET /v1/data/...`
    #[serde(alias = "get", alias = "Get")]
    Get,
    /// `POST /v1/data/...`
    #[default]
    #[serde(alias = "post", alias = "Post")]
    Post,
}

impl HttpMethod {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            _ => Err(crate::Error::config_key(
                format!("Unsupported HTTP method: {}", s),
                "method",
            )),
        }
    }
}

/// Options forwarded to the transport with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Extra request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Per-request timeout in milliseconds, overriding the transport default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl RequestOptions {
    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Get the per-request timeout.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// A request ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL
    pub url: String,
    /// JSON body, sent with `Content-Type: application/json` when present
    pub body: Option<Value>,
    /// Extra transport options
    pub options: RequestOptions,
}

/// Status and raw body of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw response body
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Create a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Create a response with a JSON body.
    pub fn json_body(status: u16, body: &Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Failure to obtain a response at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request did not complete in time
    #[error("request timed out: {0}")]
    Timeout(String),
    /// The server could not be reached
    #[error("connection failed: {0}")]
    Connect(String),
    /// Any other transport failure
    #[error("request failed: {0}")]
    Request(String),
}

/// Sends requests to the policy service.
///
/// Implementations report every status code as-is; mapping statuses to
/// errors is the client's job.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request and return the response status and body.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Box<T> {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        (**self).send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_method_parse() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!("GET".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert!("PUT".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::default(), HttpMethod::Post);
    }

    #[test]
    fn test_http_method_serde() {
        let method: HttpMethod = serde_json::from_value(json!("get")).unwrap();
        assert_eq!(method, HttpMethod::Get);
        assert_eq!(serde_json::to_value(HttpMethod::Post).unwrap(), json!("POST"));
    }

    #[test]
    fn test_request_options_timeout() {
        let options = RequestOptions::default().with_timeout(Duration::from_millis(250));
        assert_eq!(options.timeout(), Some(Duration::from_millis(250)));
        assert!(RequestOptions::default().timeout().is_none());

        let options = RequestOptions::default().with_timeout(Duration::MAX);
        assert_eq!(options.timeout_ms, Some(u64::MAX));
    }

    #[test]
    fn test_response_json() {
        let response = TransportResponse::json_body(200, &json!({"result": true}));
        let value: Value = response.json().unwrap();
        assert_eq!(value, json!({"result": true}));

        let response = TransportResponse::new(400, "not json");
        assert!(response.json::<Value>().is_err());
    }
}
