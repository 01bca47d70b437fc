// Neo4j GraphQL Gateway
// An HTTP front for the Neo4j GraphQL extension with schema upload on startup

//! # Neo4j GraphQL Gateway Library
//!
//! This is the library crate behind the `gateway` binary. It forwards GraphQL
//! queries to the GraphQL extension of a Neo4j database, uploads the schema
//! document until the database accepts it, and serves a GraphiQL explorer while
//! running in development.
//!
//! ## Core Components
//!
//! ### Upstream Client ([`neo4j`])
//! - [`GraphQLEndpoint`]: the extension URL derived from `GRAPHENEDB_URL`
//! - [`GraphQLUpstream`]: the seam every upstream call goes through
//! - [`Neo4jClient`]: the `reqwest` implementation of that seam
//!
//! ### Engine ([`engine`])
//! - [`SchemaUploader`]: uploads the schema, retrying on a fixed delay forever
//! - [`SchemaEvents`]: broadcast bus for upload lifecycle notifications
//! - [`Readiness`] / [`ReadinessSignal`]: the write-once "schema uploaded" flag
//! - [`QueryGateway`]: validates queries and forwards them upstream
//!
//! ### Server ([`server`])
//! The axum middleware chain: method filter, readiness gate, developer UI,
//! query dispatch and error responder.
//!
//! ## Layering
//!
//! ```text
//! HTTP client
//!        ↓ GET/POST
//! server (middleware chain)
//!        ↓ QueryRequest
//! engine (QueryGateway, SchemaUploader)
//!        ↓ execute(path, UpstreamRequest)
//! neo4j (Neo4jClient)
//!        ↓ HTTP
//! Neo4j GraphQL extension
//! ```
//!
//! ## Rust Learning Notes:
//!
//! ### Re-exports
//! `pub use` statements create shortcuts so users don't need to know the internal
//! module structure. Instead of `use neo4j_graphql_gateway::engine::uploader::SchemaUploader`,
//! users can write `use neo4j_graphql_gateway::SchemaUploader`.

pub mod config;
pub mod engine;
pub mod neo4j;
pub mod server;

pub use config::{Environment, GatewayConfig};
pub use engine::{
    events::{SchemaEvent, SchemaEvents},
    gateway::{QueryGateway, QueryRequest},
    readiness::{readiness, Readiness, ReadinessSignal},
    uploader::{SchemaUploader, UploadState, DEFAULT_RETRY_DELAY},
};
pub use neo4j::{GraphQLEndpoint, GraphQLUpstream, Neo4jClient, Neo4jConfig, UpstreamRequest};
pub use server::{GatewayServer, GatewayServerBuilder};

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced anywhere between the HTTP front and the upstream database
///
/// ## Rust Learning Notes:
///
/// ### Tagged Variants Instead of Subclasses
/// Every variant maps to exactly one HTTP status through [`GatewayError::status`].
/// `Upstream` is the only variant that carries its status, because it mirrors
/// whatever the database answered.
///
/// ### Why `Clone`?
/// Errors travel inside broadcast events and response extensions, both of
/// which hand out copies. That rules out `#[from]` wrappers around
/// `reqwest::Error`, so transport errors are converted explicitly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The caller supplied a missing or malformed query
    #[error("{message}")]
    Validation { message: String },

    /// Transport failure, non-2xx upstream status, or a malformed upstream response
    #[error("{message}")]
    Upstream { status: u16, message: String },

    /// A schema upload attempt failed; only ever seen by the uploader and its listeners
    #[error("Schema upload attempt {attempt} failed: {message}")]
    UploadFailed { attempt: u32, message: String },

    #[error("GraphQL only supports GET and POST requests.")]
    MethodNotAllowed,

    #[error("Initializing GraphQL API.")]
    NotReady,

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation {
            message: message.into(),
        }
    }

    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        GatewayError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// Status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Validation { .. } => StatusCode::BAD_REQUEST,
            GatewayError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            GatewayError::UploadFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::NotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable name of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Validation { .. } => "validation",
            GatewayError::Upstream { .. } => "upstream",
            GatewayError::UploadFailed { .. } => "upload_failed",
            GatewayError::MethodNotAllowed => "method_not_allowed",
            GatewayError::NotReady => "not_ready",
            GatewayError::NotFound { .. } => "not_found",
            GatewayError::Internal(_) => "internal",
        }
    }

    /// Detailed rendering used in logs and development error bodies
    ///
    /// ```
    /// use neo4j_graphql_gateway::GatewayError;
    ///
    /// let error = GatewayError::upstream(502, "Bad Gateway");
    /// assert_eq!(error.describe(), "Code: 502, Message: Bad Gateway");
    /// ```
    pub fn describe(&self) -> String {
        format!("Code: {}, Message: {}", self.status().as_u16(), self)
    }
}

/// Type alias for Results that use our custom error type
pub type Result<T> = std::result::Result<T, GatewayError>;
