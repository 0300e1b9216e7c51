//! Policy client implementation.

mod resource;

pub use resource::normalize_resource;

use crate::cache::{cache_key, Cache, NoCache};
use crate::config::ClientConfig;
use crate::telemetry::{ClientMetrics, Telemetry};
use crate::transport::{HttpMethod, HttpTransport, TransportRequest, TransportResponse};
use crate::types::BadRequestBody;
use crate::{Error, Result};

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::{debug, warn};

/// Client for the Data API of a policy service.
///
/// Generic over the transport that carries requests and the cache that
/// memoizes decisions. Without [`with_cache`](Self::with_cache) every call
/// goes to the service.
pub struct PolicyClient<T, C = NoCache> {
    /// Validated configuration
    config: ClientConfig,
    /// Transport used for every request
    transport: T,
    /// Response cache
    cache: Option<C>,
    /// Counters
    telemetry: Telemetry,
}

impl<T: HttpTransport> PolicyClient<T, NoCache> {
    /// Create a client from a configuration.
    ///
    /// # Returns
    /// * `Ok(PolicyClient)` - A client without a cache
    /// * `Err(Error::Config)` - If the configuration is invalid
    pub fn new(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            transport,
            cache: None,
            telemetry: Telemetry::default(),
        })
    }

    /// Create a client for a base URL with default settings.
    pub fn from_url(url: impl Into<String>, transport: T) -> Result<Self> {
        Self::new(ClientConfig::from_url(url), transport)
    }
}

impl<T: HttpTransport, C: Cache> PolicyClient<T, C> {
    /// Attach a response cache.
    ///
    /// Pass an `Arc` to keep a handle for clearing the cache later.
    pub fn with_cache<N: Cache>(self, cache: N) -> PolicyClient<T, N> {
        PolicyClient {
            config: self.config,
            transport: self.transport,
            cache: Some(cache),
            telemetry: self.telemetry,
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the attached cache.
    pub fn cache(&self) -> Option<&C> {
        self.cache.as_ref()
    }

    /// Get a snapshot of the client counters.
    pub fn metrics(&self) -> ClientMetrics {
        self.telemetry.metrics()
    }

    /// Query a resource and decode the response.
    ///
    /// # Arguments
    /// * `resource` - Resource in dot or slash notation, e.g. `authz.allow`
    /// * `input` - Optional input document
    ///
    /// # Returns
    /// * `Ok(R)` - The decoded response document
    /// * `Err(Error::Server)` - If the service answered 500
    /// * `Err(Error::BadRequest)` - If the service answered 4xx
    /// * `Err(Error::UnknownStatus)` - For any other non-200 status
    /// * `Err(Error::MalformedResponse)` - If the body could not be decoded
    /// * `Err(Error::Transport)` - If no response was received
    pub async fn query<R: DeserializeOwned>(
        &self,
        resource: &str,
        input: Option<&Value>,
    ) -> Result<R> {
        let result = self.fetch(resource, input).await.and_then(|document| {
            serde_json::from_value(document)
                .map_err(|e| Error::malformed(resource, input.cloned(), 200, e.to_string()))
        });
        self.observe(result)
    }

    /// Fail unless the resource's `result` is `true`.
    pub async fn assert(&self, resource: &str, input: Option<&Value>) -> Result<()> {
        self.assert_with(resource, input, true).await
    }

    /// Fail with [`Error::AssertFailed`] unless the resource's `result`
    /// equals `expected`.
    pub async fn assert_with(
        &self,
        resource: &str,
        input: Option<&Value>,
        expected: bool,
    ) -> Result<()> {
        let result = self.fetch(resource, input).await.and_then(|document| {
            if document.get("result") == Some(&Value::Bool(expected)) {
                Ok(())
            } else {
                Err(Error::assert_failed(resource, input.cloned(), expected))
            }
        });
        self.observe(result)
    }

    /// Evaluate a boolean policy.
    ///
    /// A response without a boolean `result` means the resource does not
    /// exist or is not a boolean rule.
    ///
    /// # Returns
    /// * `Ok(bool)` - The decision
    /// * `Err(Error::NotFound)` - If `result` is missing or not a boolean
    pub async fn evaluate(&self, resource: &str, input: Option<&Value>) -> Result<bool> {
        let result = self
            .fetch(resource, input)
            .await
            .and_then(|document| match document.get("result") {
                Some(Value::Bool(decision)) => Ok(*decision),
                _ => Err(Error::not_found(resource, input.cloned())),
            });
        self.observe(result)
    }

    /// Check if the policy service reports itself healthy.
    ///
    /// Sends `GET {url}/health` and never touches the cache.
    pub async fn health_check(&self) -> bool {
        let request = TransportRequest {
            method: HttpMethod::Get,
            url: format!("{}/health", self.config.base_url()),
            body: None,
            options: self.config.request_options.clone(),
        };

        match self.transport.send(request).await {
            Ok(response) => (200..300).contains(&response.status),
            Err(e) => {
                debug!(error = %e, "health check failed");
                false
            }
        }
    }

    fn observe<V>(&self, result: Result<V>) -> Result<V> {
        if let Err(ref e) = result {
            self.telemetry.record_error(e);
            debug!(category = e.category(), error = %e, "policy call failed");
        }
        result
    }

    /// Look the query up in the cache, otherwise send it and store a
    /// successful answer.
    async fn fetch(&self, resource: &str, input: Option<&Value>) -> Result<Value> {
        self.telemetry.record_query();

        let input = input.filter(|document| !document.is_null());
        let path = normalize_resource(resource);
        let key = cache_key(&path, input);

        if let Some(ref cache) = self.cache {
            match cache.get(&key) {
                Some(cached) if !cached.is_null() => {
                    self.telemetry.record_cache(true);
                    debug!(resource = %resource, cache_key = %key, "cache hit");
                    return Ok(cached);
                }
                _ => {
                    self.telemetry.record_cache(false);
                    debug!(resource = %resource, cache_key = %key, "cache miss");
                }
            }
        }

        let request = TransportRequest {
            method: self.config.method,
            url: self.config.data_url(&path),
            body: input.map(|document| json!({ "input": document })),
            options: self.config.request_options.clone(),
        };
        debug!(method = %request.method, url = %request.url, "sending policy query");

        let start = Instant::now();
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| Error::transport(resource, input.cloned(), e.to_string()))?;
        self.telemetry
            .record_request(start.elapsed().as_secs_f64() * 1000.0);

        let document = interpret(resource, input, &response)?;

        if let Some(ref cache) = self.cache {
            cache.set(key, document.clone());
        }

        Ok(document)
    }
}

/// Map a response to its document or to the error its status stands for.
fn interpret(resource: &str, input: Option<&Value>, response: &TransportResponse) -> Result<Value> {
    let status = response.status;
    match status {
        500 => {
            warn!(resource = %resource, status, "policy service error");
            Err(Error::server(resource, input.cloned()))
        }
        400..=499 => {
            let body: BadRequestBody = response
                .json()
                .map_err(|e| Error::malformed(resource, input.cloned(), status, e.to_string()))?;
            warn!(
                resource = %resource,
                status,
                detail = %body.summary().unwrap_or_default(),
                "policy query rejected"
            );
            Err(Error::bad_request(resource, input.cloned(), status, body))
        }
        200 => response
            .json()
            .map_err(|e| Error::malformed(resource, input.cloned(), status, e.to_string())),
        _ => {
            warn!(resource = %resource, status, "unexpected status from policy service");
            Err(Error::unknown_status(resource, input.cloned(), status))
        }
    }
}
