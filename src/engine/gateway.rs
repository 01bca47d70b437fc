// Query gateway
// Validates inbound queries and forwards them to the GraphQL extension

use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::neo4j::{GraphQLUpstream, UpstreamQuery, UpstreamRequest, QUERY_PATH};
use crate::{GatewayError, Result};

/// Query used to fetch the type listing of the uploaded schema
pub const INTROSPECTION_QUERY: &str = "query {__schema {types {kind, name, description}}}";

/// An inbound GraphQL request body
///
/// Every field is optional on the wire; a missing query is reported by the
/// gateway, not by deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub variables: Option<Value>,
    #[serde(default, rename = "operationName")]
    pub operation_name: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Default::default()
        }
    }
}

/// Forwards queries to the GraphQL extension
pub struct QueryGateway {
    upstream: Arc<dyn GraphQLUpstream>,
    schema: OnceCell<Value>,
}

impl QueryGateway {
    pub fn new(upstream: Arc<dyn GraphQLUpstream>) -> Self {
        Self {
            upstream,
            schema: OnceCell::new(),
        }
    }

    /// Run a bare query string
    pub async fn run_query(&self, query: &str) -> Result<Value> {
        self.execute(&QueryRequest::new(query)).await
    }

    /// Run a query request and return the upstream JSON unchanged
    ///
    /// Fails with a validation error, before any network call, when the query
    /// is missing or blank. Fails with a 500 upstream error when the answer
    /// carries neither `data` nor `errors`.
    pub async fn execute(&self, request: &QueryRequest) -> Result<Value> {
        let query = request
            .query
            .as_deref()
            .filter(|query| !query.trim().is_empty())
            .ok_or_else(|| GatewayError::validation("Must provide query string."))?;

        let envelope = UpstreamQuery {
            query,
            variables: request.variables.as_ref().filter(|v| !v.is_null()),
            operation_name: request.operation_name.as_deref(),
        };
        debug!("Forwarding query ({} bytes)", query.len());

        let json = self
            .upstream
            .execute(QUERY_PATH, UpstreamRequest::json(&envelope)?)
            .await?;

        if has_field(&json, "data") || has_field(&json, "errors") {
            Ok(json)
        } else {
            Err(GatewayError::upstream(
                500,
                "Upstream response contained neither data nor errors",
            ))
        }
    }

    /// Fetch the type listing of the live schema, cached after the first success
    pub async fn introspect_schema(&self) -> Result<Value> {
        let schema = self
            .schema
            .get_or_try_init(|| async {
                let mut json = self.run_query(INTROSPECTION_QUERY).await?;
                let schema = json.pointer_mut("/data/__schema").map(Value::take);

                match schema {
                    Some(schema) if !schema.is_null() => Ok(schema),
                    _ => {
                        let message = json
                            .get("errors")
                            .filter(|errors| !errors.is_null())
                            .map(|errors| errors.to_string())
                            .unwrap_or_else(|| "The response did not include a schema".to_string());
                        Err(GatewayError::upstream(404, message))
                    }
                }
            })
            .await?;

        Ok(schema.clone())
    }
}

fn has_field(json: &Value, field: &str) -> bool {
    json.get(field).map_or(false, |value| !value.is_null())
}
