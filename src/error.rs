//! Error types for the policy client.
//!
//! Every failure of a query carries the resource it was issued for and the
//! input document that accompanied it, so callers can log or report the
//! exact decision that could not be made.

use crate::types::BadRequestBody;
use serde_json::Value;
use thiserror::Error;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the policy client.
#[derive(Error, Debug)]
pub enum Error {
    /// The policy service answered with status 500
    #[error("OPA server error occurred retrieving resource {resource}")]
    Server {
        /// Resource as given by the caller
        resource: String,
        /// Input document sent with the query
        input: Option<Value>,
    },

    /// The policy service rejected the request with a 4xx status
    #[error("OPA bad request (status {status}) for resource {resource}{}", bad_request_detail(.body))]
    BadRequest {
        /// Resource as given by the caller
        resource: String,
        /// Input document sent with the query
        input: Option<Value>,
        /// HTTP status code, 400 through 499
        status: u16,
        /// Decoded error body
        body: BadRequestBody,
    },

    /// The policy service answered with a status the client does not handle
    #[error("OPA returned unexpected status {status} retrieving resource {resource}")]
    UnknownStatus {
        /// Resource as given by the caller
        resource: String,
        /// Input document sent with the query
        input: Option<Value>,
        /// HTTP status code
        status: u16,
    },

    /// The decision did not match the expected value
    #[error("OPA assert failed for resource {resource}: expected {expected}")]
    AssertFailed {
        /// Resource as given by the caller
        resource: String,
        /// Input document sent with the query
        input: Option<Value>,
        /// Value the caller expected in `result`
        expected: bool,
    },

    /// The decision has no boolean `result`
    #[error("OPA resource {resource} not found")]
    NotFound {
        /// Resource as given by the caller
        resource: String,
        /// Input document sent with the query
        input: Option<Value>,
    },

    /// The response body could not be decoded
    #[error("Malformed OPA response for resource {resource} (status {status}): {message}")]
    MalformedResponse {
        /// Resource as given by the caller
        resource: String,
        /// Input document sent with the query
        input: Option<Value>,
        /// HTTP status code of the response
        status: u16,
        /// Decoder error message
        message: String,
    },

    /// The transport failed before a response was received
    #[error("Transport error retrieving resource {resource}: {message}")]
    Transport {
        /// Resource as given by the caller
        resource: String,
        /// Input document sent with the query
        input: Option<Value>,
        /// Transport error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Detailed error message
        message: String,
        /// Configuration key that caused the error
        key: Option<String>,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Discriminant of [`Error`], without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`Error::Server`]
    Server,
    /// See [`Error::BadRequest`]
    BadRequest,
    /// See [`Error::UnknownStatus`]
    UnknownStatus,
    /// See [`Error::AssertFailed`]
    AssertFailed,
    /// See [`Error::NotFound`]
    NotFound,
    /// See [`Error::MalformedResponse`]
    MalformedResponse,
    /// See [`Error::Transport`]
    Transport,
    /// See [`Error::Config`]
    Config,
    /// See [`Error::Serialization`]
    Serialization,
}

fn bad_request_detail(body: &BadRequestBody) -> String {
    match body.summary() {
        Some(summary) => format!(": {}", summary),
        None => String::new(),
    }
}

impl Error {
    /// Create a server error.
    pub fn server(resource: impl Into<String>, input: Option<Value>) -> Self {
        Error::Server {
            resource: resource.into(),
            input,
        }
    }

    /// Create a bad request error.
    pub fn bad_request(
        resource: impl Into<String>,
        input: Option<Value>,
        status: u16,
        body: BadRequestBody,
    ) -> Self {
        Error::BadRequest {
            resource: resource.into(),
            input,
            status,
            body,
        }
    }

    /// Create an unknown status error.
    pub fn unknown_status(resource: impl Into<String>, input: Option<Value>, status: u16) -> Self {
        Error::UnknownStatus {
            resource: resource.into(),
            input,
            status,
        }
    }

    /// Create an assertion error.
    pub fn assert_failed(resource: impl Into<String>, input: Option<Value>, expected: bool) -> Self {
        Error::AssertFailed {
            resource: resource.into(),
            input,
            expected,
        }
    }

    /// Create a not found error.
    pub fn not_found(resource: impl Into<String>, input: Option<Value>) -> Self {
        Error::NotFound {
            resource: resource.into(),
            input,
        }
    }

    /// Create a malformed response error.
    pub fn malformed(
        resource: impl Into<String>,
        input: Option<Value>,
        status: u16,
        message: impl Into<String>,
    ) -> Self {
        Error::MalformedResponse {
            resource: resource.into(),
            input,
            status,
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(
        resource: impl Into<String>,
        input: Option<Value>,
        message: impl Into<String>,
    ) -> Self {
        Error::Transport {
            resource: resource.into(),
            input,
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: None,
        }
    }

    /// Create a configuration error with key context.
    pub fn config_key(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Get the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Server { .. } => ErrorKind::Server,
            Error::BadRequest { .. } => ErrorKind::BadRequest,
            Error::UnknownStatus { .. } => ErrorKind::UnknownStatus,
            Error::AssertFailed { .. } => ErrorKind::AssertFailed,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::MalformedResponse { .. } => ErrorKind::MalformedResponse,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Config { .. } => ErrorKind::Config,
            Error::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Resource the failed query was issued for, if any.
    pub fn resource(&self) -> Option<&str> {
        match self {
            Error::Server { resource, .. }
            | Error::BadRequest { resource, .. }
            | Error::UnknownStatus { resource, .. }
            | Error::AssertFailed { resource, .. }
            | Error::NotFound { resource, .. }
            | Error::MalformedResponse { resource, .. }
            | Error::Transport { resource, .. } => Some(resource),
            Error::Config { .. } | Error::Serialization(_) => None,
        }
    }

    /// Input document of the failed query, if any was sent.
    pub fn input(&self) -> Option<&Value> {
        match self {
            Error::Server { input, .. }
            | Error::BadRequest { input, .. }
            | Error::UnknownStatus { input, .. }
            | Error::AssertFailed { input, .. }
            | Error::NotFound { input, .. }
            | Error::MalformedResponse { input, .. }
            | Error::Transport { input, .. } => input.as_ref(),
            Error::Config { .. } | Error::Serialization(_) => None,
        }
    }

    /// HTTP status code behind this error, when a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Server { .. } => Some(500),
            Error::BadRequest { status, .. }
            | Error::UnknownStatus { status, .. }
            | Error::MalformedResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Check whether repeating the same call could plausibly succeed.
    ///
    /// The client never retries on its own; this is a hint for callers
    /// that layer their own retry policy on top.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Server { .. } | Error::Transport { .. } => true,
            Error::UnknownStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get the error category for metrics and log fields.
    pub fn category(&self) -> &'static str {
        match self {
            Error::Server { .. } => "server",
            Error::BadRequest { .. } => "bad_request",
            Error::UnknownStatus { .. } => "unknown_status",
            Error::AssertFailed { .. } => "assert",
            Error::NotFound { .. } => "not_found",
            Error::MalformedResponse { .. } => "malformed_response",
            Error::Transport { .. } => "transport",
            Error::Config { .. } => "config",
            Error::Serialization(_) => "serialization",
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        match err {
            config::ConfigError::NotFound(key) => {
                Error::config_key("missing configuration value", key)
            }
            other => Error::config(other.to_string()),
        }
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::config(format!("invalid YAML configuration: {}", err))
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let key = errors.field_errors().keys().next().map(|k| k.to_string());
        Error::Config {
            message: errors.to_string(),
            key,
        }
    }
}
