//! reqwest-backed transport.

use super::{HttpMethod, HttpTransport, TransportError, TransportRequest, TransportResponse};
use async_trait::async_trait;
use std::time::Duration;

/// Default timeout applied when no per-request timeout is given.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

const USER_AGENT: &str = concat!("opa-policy-client/", env!("CARGO_PKG_VERSION"));

/// Transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the default timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    /// Create a transport with the given default timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wrap an existing client, keeping its configuration.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Request(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.options.timeout() {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify)?;

        Ok(TransportResponse::new(status, body.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::ClientConfig;
    use crate::transport::RequestOptions;
    use crate::{Error, PolicyClient, QueryResponse};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> PolicyClient<ReqwestTransport> {
        PolicyClient::from_url(server.uri(), ReqwestTransport::new().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_query_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/data/my/resource/allow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let response: QueryResponse = client.query("my.resource.allow", None).await.unwrap();
        assert_eq!(response.result, Some(json!(true)));
    }

    #[tokio::test]
    async fn test_query_sends_input_body() {
        let server = MockServer::start().await;
        let input = json!({"subject": {"id": 1, "type": "user"}});
        Mock::given(method("POST"))
            .and(path("/v1/data/my/resource/allow"))
            .and(body_json(json!({"input": input.clone()})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": false})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let allowed = client.evaluate("my/resource/allow", Some(&input)).await.unwrap();
        assert!(!allowed);
    }

    #[tokio::test]
    async fn test_get_method_and_version() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/data/my/resource/allow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig::from_url(server.uri())
            .with_opa_version("v2")
            .with_method(HttpMethod::Get);
        let client = PolicyClient::new(config, ReqwestTransport::new().unwrap()).unwrap();
        client.assert("my.resource.allow", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_request_options_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/data/tenants/allow"))
            .and(header("x-tenant", "acme"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig::from_url(server.uri())
            .with_request_options(RequestOptions::default().with_header("x-tenant", "acme"));
        let client = PolicyClient::new(config, ReqwestTransport::new().unwrap()).unwrap();
        assert!(client.evaluate("tenants.allow", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_bad_request_over_http() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/data/my/resource/allow"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "invalid_parameter",
                "message": "error(s) occurred while parsing query"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client
            .query::<Value>("my.resource.allow", None)
            .await
            .unwrap_err();
        match err {
            Error::BadRequest { body, .. } => {
                assert_eq!(body.code.as_deref(), Some("invalid_parameter"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cached_query_hits_server_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/data/my/resource/allow"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(1)
            .mount(&server)
            .await;

        let cache = Arc::new(MemoryCache::new(100));
        let client = client_for(&server).await.with_cache(cache.clone());
        for _ in 0..3 {
            assert!(client.evaluate("my.resource.allow", None).await.unwrap());
        }
        assert_eq!(cache.stats().hits, 2);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"result": true}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = ClientConfig::from_url(server.uri()).with_request_options(
            RequestOptions::default().with_timeout(Duration::from_millis(50)),
        );
        let client = PolicyClient::new(config, ReqwestTransport::new().unwrap()).unwrap();
        let err = client.evaluate("slow.allow", None).await.unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(err.to_string().contains("timed out"));
    }
}
