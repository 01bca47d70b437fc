//! Neo4j upstream configuration
//! This module contains the endpoint derivation and client settings

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix of a database REST URL, as handed out in `GRAPHENEDB_URL`
const DATA_PATH_SUFFIX: &str = "/db/data";

/// Path segment of the GraphQL extension that replaces [`DATA_PATH_SUFFIX`]
const GRAPHQL_PATH: &str = "/graphql/";

/// Base URL of the GraphQL extension
///
/// Always ends with `/`, so `join("idl")` and `join("")` produce the upload
/// and query URLs directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLEndpoint(String);

impl GraphQLEndpoint {
    /// Derive the extension endpoint from a database URL
    ///
    /// A trailing `/db/data` becomes `/graphql/`. Any other URL is kept as is,
    /// apart from a trailing `/` being added when missing.
    ///
    /// ```
    /// use neo4j_graphql_gateway::GraphQLEndpoint;
    ///
    /// let endpoint = GraphQLEndpoint::from_database_url("http://neo4j:7474/db/data");
    /// assert_eq!(endpoint.as_str(), "http://neo4j:7474/graphql/");
    /// ```
    pub fn from_database_url(url: &str) -> Self {
        let base = match url.strip_suffix(DATA_PATH_SUFFIX) {
            Some(prefix) => format!("{}{}", prefix, GRAPHQL_PATH),
            None if url.ends_with('/') => url.to_string(),
            None => format!("{}/", url),
        };

        Self(base)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full URL for a path relative to the endpoint
    pub fn join(&self, path: &str) -> String {
        format!("{}{}", self.0, path.trim_start_matches('/'))
    }
}

impl fmt::Display for GraphQLEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Neo4j-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Neo4jConfig {
    /// Database URL, typically ending in `/db/data`
    pub database_url: String,
    /// Request timeout in seconds; `None` leaves upstream calls unbounded
    pub timeout_seconds: Option<u64>,
}

impl Neo4jConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }

    pub fn endpoint(&self) -> GraphQLEndpoint {
        GraphQLEndpoint::from_database_url(&self.database_url)
    }
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            database_url: "http://localhost:7474/db/data".to_string(),
            timeout_seconds: None,
        }
    }
}
