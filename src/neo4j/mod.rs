//! Neo4j GraphQL extension module
//! This module provides the upstream client used to reach the database's GraphQL extension

pub mod client;
pub mod config;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use client::Neo4jClient;
pub use config::{GraphQLEndpoint, Neo4jConfig};
pub use types::{UpstreamQuery, UpstreamRequest};

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

/// Path of the schema upload endpoint, relative to [`GraphQLEndpoint`]
pub const IDL_PATH: &str = "idl";

/// Path of the query endpoint, relative to [`GraphQLEndpoint`]
pub const QUERY_PATH: &str = "";

/// Core trait for anything that can answer GraphQL extension requests
///
/// The schema uploader and the query gateway only ever talk to the database
/// through this trait, so both can be driven by an in-memory fake in tests.
#[async_trait]
pub trait GraphQLUpstream: Send + Sync {
    /// Send `request` to `path` (appended to the endpoint base) and return the decoded JSON body
    async fn execute(&self, path: &str, request: UpstreamRequest) -> Result<Value>;
}
