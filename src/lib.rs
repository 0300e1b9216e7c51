//! # OPA Policy Client
//!
//! Client for the Data API of an Open Policy Agent server. Resources are
//! named in dot or slash notation and mapped onto `/{version}/data/...`
//! endpoints; HTTP statuses are mapped onto typed errors.
//!
//! ## Features
//!
//! - **Queries**: Fetch any policy document, decoded into the type you ask for
//! - **Assertions**: Fail unless a decision has the expected value
//! - **Evaluation**: Read a boolean decision
//! - **Caching**: Optional response cache keyed by resource and input
//! - **Pluggable transport**: The client is generic over [`HttpTransport`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use opa_policy_client::{MemoryCache, PolicyClient, ReqwestTransport};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = PolicyClient::from_url("http://localhost:8181", ReqwestTransport::new()?)?
//!         .with_cache(MemoryCache::new(1_000));
//!
//!     let input = json!({
//!         "subject": { "id": "user-123", "type": "user" },
//!         "resource": { "id": "doc-42" }
//!     });
//!
//!     if client.evaluate("documents.read.allow", Some(&input)).await? {
//!         println!("access granted");
//!     }
//!
//!     client.assert("documents.admin", Some(&input)).await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod transport;
pub mod types;

// Re-export main types for convenience
pub use cache::{cache_key, Cache, CacheStats, MemoryCache, NoCache};
pub use client::{normalize_resource, PolicyClient};
pub use config::ClientConfig;
pub use error::{Error, ErrorKind, Result};
pub use telemetry::{init_logging, ClientMetrics};
#[cfg(feature = "reqwest-transport")]
pub use transport::ReqwestTransport;
pub use transport::{
    HttpMethod, HttpTransport, RequestOptions, TransportError, TransportRequest,
    TransportResponse,
};
pub use types::{BadRequestBody, Entity, EntityId, QueryInput, QueryResponse, Warning};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
