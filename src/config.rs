//! Client configuration.
//!
//! A [`ClientConfig`] can be built in code, read from a file in any format
//! the `config` crate understands, parsed from YAML, or assembled from
//! `OPA_`-prefixed environment variables.

use crate::transport::{HttpMethod, RequestOptions};
use crate::Result;

use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::{Validate, ValidationError};

/// Default Data API version segment.
pub const DEFAULT_OPA_VERSION: &str = "v1";

/// Prefix of environment variables read by [`ClientConfig::from_env`].
pub const ENV_PREFIX: &str = "OPA";

fn default_opa_version() -> String {
    DEFAULT_OPA_VERSION.to_string()
}

fn validate_version_segment(version: &str) -> std::result::Result<(), ValidationError> {
    if version.contains('/') {
        return Err(ValidationError::new("version_segment"));
    }
    Ok(())
}

/// Configuration of a [`PolicyClient`](crate::PolicyClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ClientConfig {
    /// Base URL of the policy service, e.g. `https://opa.internal:8181`
    #[validate(url)]
    pub url: String,
    /// API version segment inserted before `/data`
    ///
    /// Also accepted as `version`, which is what `OPA_VERSION` maps to.
    #[serde(default = "default_opa_version", alias = "version")]
    #[validate(length(min = 1), custom = "validate_version_segment")]
    pub opa_version: String,
    /// HTTP method used for queries
    #[serde(default)]
    pub method: HttpMethod,
    /// Options forwarded to the transport with every request
    #[serde(default)]
    pub request_options: RequestOptions,
}

impl ClientConfig {
    /// Create a configuration for the given base URL with defaults.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            opa_version: default_opa_version(),
            method: HttpMethod::default(),
            request_options: RequestOptions::default(),
        }
    }

    /// Load configuration from `OPA_URL`, `OPA_VERSION` and `OPA_METHOD`.
    ///
    /// Nested request options use a double underscore, e.g.
    /// `OPA_REQUEST_OPTIONS__TIMEOUT_MS`.
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file; the format follows the extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the API version segment.
    pub fn with_opa_version(mut self, version: impl Into<String>) -> Self {
        self.opa_version = version.into();
        self
    }

    /// Set the HTTP method.
    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Set the transport options.
    pub fn with_request_options(mut self, options: RequestOptions) -> Self {
        self.request_options = options;
        self
    }

    /// Base URL without trailing slashes.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Endpoint for an already-normalized resource path.
    pub fn data_url(&self, resource_path: &str) -> String {
        format!(
            "{}/{}/data/{}",
            self.base_url(),
            self.opa_version,
            resource_path
        )
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self)?;
        Ok(())
    }
}
