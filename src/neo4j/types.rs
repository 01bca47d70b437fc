//! Wire types for the Neo4j GraphQL extension

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use crate::{GatewayError, Result};

/// A single request to the GraphQL extension
///
/// Defaults to `POST` with no body and no extra headers.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub body: Option<String>,
    pub headers: HeaderMap,
}

impl UpstreamRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// JSON-encode `payload` as the body and set `Content-Type: application/json`
    pub fn json<T: Serialize>(payload: &T) -> Result<Self> {
        let body = serde_json::to_string(payload).map_err(|e| {
            GatewayError::Internal(format!("Failed to encode upstream request: {}", e))
        })?;

        Ok(Self::new()
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body))
    }
}

impl Default for UpstreamRequest {
    fn default() -> Self {
        Self {
            method: Method::POST,
            body: None,
            headers: HeaderMap::new(),
        }
    }
}

/// Query envelope sent to the extension's query endpoint
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamQuery<'a> {
    pub query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<&'a Value>,
    #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<&'a str>,
}
