// Gateway Engine
// Schema lifecycle and query forwarding on top of the upstream client

//! # Gateway Engine Module
//!
//! The engine sits between the HTTP front (in `server/`) and the upstream
//! client (in `neo4j/`). It owns the only stateful parts of the gateway.
//!
//! ## Engine Components
//!
//! ### Schema Uploader (`uploader` module)
//! - Sends the schema document to the `idl` endpoint
//! - Retries after a fixed delay, forever, until the database accepts it
//! - Keeps at most one upload task (and so one retry timer) alive
//!
//! ### Lifecycle Events (`events` module)
//! - Broadcast bus carrying `Upload`, `Uploaded` and `Retry` notifications
//! - A logger task that turns them into tracing output
//!
//! ### Readiness (`readiness` module)
//! - Write-once flag: the uploader writes it, the readiness gate reads it
//!
//! ### Query Gateway (`gateway` module)
//! - Validates query text before any network call
//! - Checks the upstream answer carries `data` or `errors`
//! - Caches the introspected schema
//!
//! ## Rust Learning Notes:
//!
//! ### Sharing State Across Tasks
//! Everything here is shared through `Arc` and tokio channels (`watch`,
//! `broadcast`) instead of globals. Each piece of state has exactly one
//! writer, which keeps the locking story trivial.

pub mod events;
pub mod gateway;
pub mod readiness;
pub mod uploader;

pub use events::{spawn_event_logger, SchemaEvent, SchemaEvents};
pub use gateway::{QueryGateway, QueryRequest, INTROSPECTION_QUERY};
pub use readiness::{readiness, Readiness, ReadinessSignal};
pub use uploader::{SchemaUploader, UploadState, DEFAULT_RETRY_DELAY, DEFAULT_SCHEMA};
