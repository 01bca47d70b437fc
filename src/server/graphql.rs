// GraphQL gateway server
// Wires the upstream client, schema uploader and query gateway behind axum

use axum::{
    extract::State,
    http::Uri,
    middleware::{from_fn, from_fn_with_state},
    routing::any,
    Json, Router, Server,
};
use bytes::Bytes;
use serde_json::Value;
use std::net::TcpListener;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::middleware::{developer_ui, error_responder, method_filter, readiness_gate};
use crate::config::{Environment, GatewayConfig};
use crate::engine::{
    readiness, spawn_event_logger, QueryGateway, QueryRequest, Readiness, SchemaEvents,
    SchemaUploader,
};
use crate::neo4j::{GraphQLUpstream, Neo4jClient};
use crate::{GatewayError, Result};

/// State shared by every stage of the HTTP front
#[derive(Clone)]
pub struct FrontState {
    pub gateway: Arc<QueryGateway>,
    pub readiness: Readiness,
    pub environment: Environment,
}

/// Build the full middleware chain around the GraphQL endpoint
pub fn router(state: FrontState) -> Router {
    let mut app = Router::new()
        .route("/", any(dispatch_query))
        .route("/graphql", any(dispatch_query))
        .fallback(not_found);

    if state.environment.is_development() {
        app = app.layer(from_fn(developer_ui));
    }

    app.layer(from_fn_with_state(state.clone(), readiness_gate))
        .layer(from_fn(method_filter))
        .layer(from_fn_with_state(state.clone(), error_responder))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Make JSON GraphQL queries
async fn dispatch_query(
    State(state): State<FrontState>,
    body: Bytes,
) -> std::result::Result<Json<Value>, GatewayError> {
    let request = parse_query_request(&body)?;
    let json = state.gateway.execute(&request).await?;
    Ok(Json(json))
}

async fn not_found(uri: Uri) -> GatewayError {
    GatewayError::NotFound {
        path: uri.path().to_string(),
    }
}

/// An absent body means an absent query; the gateway reports that
fn parse_query_request(body: &[u8]) -> Result<QueryRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(QueryRequest::default());
    }

    serde_json::from_slice(body)
        .map_err(|e| GatewayError::validation(format!("Body must be a JSON object: {}", e)))
}

/// Gateway server
pub struct GatewayServer {
    config: GatewayConfig,
    upstream: Option<Arc<dyn GraphQLUpstream>>,
    schema: Option<String>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            upstream: None,
            schema: None,
        }
    }

    /// Talk to `upstream` instead of a [`Neo4jClient`] built from the config
    pub fn with_upstream(mut self, upstream: Arc<dyn GraphQLUpstream>) -> Self {
        self.upstream = Some(upstream);
        self
    }

    /// Upload `schema` instead of the document named by the config
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Bind the configured address and serve until ctrl-c
    pub async fn run(self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.config.bind_address())?;
        self.serve(listener).await
    }

    /// Upload the schema in the background and serve on an already bound `listener`
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let schema = match self.schema {
            Some(schema) => schema,
            None => self.config.load_schema()?,
        };
        let upstream = self
            .upstream
            .unwrap_or_else(|| Arc::new(Neo4jClient::new(self.config.neo4j_config())));

        let (signal, readiness) = readiness();
        let events = SchemaEvents::new();
        spawn_event_logger(events.subscribe());

        // Dropping the uploader aborts its task, so it lives as long as the server
        let uploader = SchemaUploader::new(upstream.clone(), signal)
            .with_retry_delay(self.config.retry_delay())
            .with_events(events);
        uploader.set_schema(schema).await;

        let app = router(FrontState {
            gateway: Arc::new(QueryGateway::new(upstream)),
            readiness,
            environment: self.config.environment,
        });

        let address = listener.local_addr()?;

        info!(
            "🚀 Running a GraphQL API server in {} at http://{}",
            self.config.environment, address
        );
        info!(
            "🔗 Upstream GraphQL endpoint: {}",
            self.config.neo4j_config().endpoint()
        );
        if self.config.environment.is_development() {
            info!("📊 GraphiQL interface: http://{}/", address);
        }

        Server::from_tcp(listener)?
            .serve(app.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        drop(uploader);
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}

/// Builder pattern for the gateway server
pub struct GatewayServerBuilder {
    server: GatewayServer,
}

impl GatewayServerBuilder {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            server: GatewayServer::new(config),
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.server.config.environment = environment;
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<dyn GraphQLUpstream>) -> Self {
        self.server = self.server.with_upstream(upstream);
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.server = self.server.with_schema(schema);
        self
    }

    pub fn build(self) -> GatewayServer {
        self.server
    }

    pub async fn build_and_run(
        self,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.server.run().await
    }
}
