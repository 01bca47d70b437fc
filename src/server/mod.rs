// Gateway HTTP front
// Routing, request gating and error rendering for the GraphQL endpoint

//! # Gateway Server Module
//!
//! This module exposes the query gateway over HTTP. Every request runs
//! through an ordered middleware chain, and any stage may short-circuit by
//! returning a [`GatewayError`](crate::GatewayError):
//!
//! ```text
//! error responder      renders {message} / {message, error}
//!   ↓
//! method filter        GET and POST only (405 + Allow)
//!   ↓
//! readiness gate       503 until the schema is uploaded
//!   ↓
//! developer UI         GraphiQL for HTML-preferring clients (development only)
//!   ↓
//! query dispatch       QueryGateway → JSON response
//! ```
//!
//! ## Rust Learning Notes:
//!
//! ### Errors as Responses
//! `GatewayError` implements `IntoResponse` by stashing itself in the response
//! extensions. Only the outermost stage turns it into a body, because only
//! that stage knows whether internals may be shown.

pub mod graphql;
pub mod middleware;


pub use graphql::{router, FrontState, GatewayServer, GatewayServerBuilder};
pub use middleware::{ErrorBody, ErrorDetail};
