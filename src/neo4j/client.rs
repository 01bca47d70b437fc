//! Neo4j upstream client implementation
//! This module contains the client that makes requests to the Neo4j GraphQL extension

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

use super::config::{GraphQLEndpoint, Neo4jConfig};
use super::types::UpstreamRequest;
use super::GraphQLUpstream;
use crate::{GatewayError, Result};

/// Status reported when the upstream gave us nothing better
const DEFAULT_FAILURE_STATUS: u16 = 500;

/// Neo4j GraphQL extension client
pub struct Neo4jClient {
    client: Client,
    endpoint: GraphQLEndpoint,
}

impl Neo4jClient {
    /// Create a new Neo4j client with configuration
    pub fn new(config: Neo4jConfig) -> Self {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(timeout));
        }
        let client = builder.build().unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: config.endpoint(),
        }
    }

    /// The GraphQL extension base URL every path is appended to
    pub fn endpoint(&self) -> &GraphQLEndpoint {
        &self.endpoint
    }

    async fn send(&self, url: &str, request: UpstreamRequest) -> Result<Value> {
        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            // Pass on the status we received
            return Err(GatewayError::upstream(
                status.as_u16(),
                status.canonical_reason().unwrap_or("Upstream request failed"),
            ));
        }

        response.json::<Value>().await.map_err(|e| {
            GatewayError::upstream(
                DEFAULT_FAILURE_STATUS,
                format!("Failed to parse upstream response: {}", e),
            )
        })
    }
}

#[async_trait]
impl GraphQLUpstream for Neo4jClient {
    async fn execute(&self, path: &str, request: UpstreamRequest) -> Result<Value> {
        let url = self.endpoint.join(path);
        debug!("{} {}", request.method, url);

        let result = self.send(&url, request).await;
        if let Err(e) = &result {
            error!("Upstream request to {} failed: {}", url, e.describe());
        }
        result
    }
}

fn transport_error(e: reqwest::Error) -> GatewayError {
    let status = e
        .status()
        .map(|s| s.as_u16())
        .unwrap_or(DEFAULT_FAILURE_STATUS);
    GatewayError::upstream(status, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neo4j::{IDL_PATH, QUERY_PATH};
    use reqwest::header::{HeaderValue, CONTENT_TYPE};
    use serde_json::json;
    use tokio_test::assert_err;

    fn client_for(server: &mockito::Server) -> Neo4jClient {
        Neo4jClient::new(Neo4jConfig::new(format!("{}/db/data", server.url())))
    }

    #[tokio::test]
    async fn test_success_returns_json_unchanged() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql/")
            .match_header("content-type", "application/json")
            .match_body(r#"{"query":"{ hello }"}"#)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"hello":"Hello world!"}}"#)
            .create_async()
            .await;

        let client = client_for(&server);
        let request = UpstreamRequest::new()
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(r#"{"query":"{ hello }"}"#);
        let json = client.execute(QUERY_PATH, request).await.unwrap();

        assert_eq!(json, json!({"data": {"hello": "Hello world!"}}));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_idl_path_receives_raw_schema() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql/idl")
            .match_body("type Query { hello: String }")
            .with_status(200)
            .with_body("\"ok\"")
            .create_async()
            .await;

        let client = client_for(&server);
        let json = client
            .execute(
                IDL_PATH,
                UpstreamRequest::new().with_body("type Query { hello: String }"),
            )
            .await
            .unwrap();

        assert_eq!(json, json!("ok"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_carried() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql/idl")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server);
        let error = assert_err!(client.execute(IDL_PATH, UpstreamRequest::new()).await);

        assert_eq!(error, GatewayError::upstream(404, "Not Found"));
    }

    #[tokio::test]
    async fn test_invalid_json_is_upstream_500() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/graphql/")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let client = client_for(&server);
        let error = assert_err!(client.execute(QUERY_PATH, UpstreamRequest::new()).await);

        assert!(matches!(error, GatewayError::Upstream { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_connection_failure_defaults_to_500() {
        let client = Neo4jClient::new(Neo4jConfig::new("http://127.0.0.1:1/db/data"));
        let error = assert_err!(client.execute(IDL_PATH, UpstreamRequest::new()).await);

        assert_eq!(error.status().as_u16(), 500);
        assert_eq!(error.kind(), "upstream");
    }
}
