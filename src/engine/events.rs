// Schema lifecycle notifications

//! # Schema Events
//!
//! The uploader publishes one event per lifecycle step. Anyone interested
//! (the lifecycle logger, tests, future health checks) subscribes to the bus.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::GatewayError;

/// Notification emitted by the schema uploader
#[derive(Debug, Clone)]
pub enum SchemaEvent {
    /// An upload request is about to be sent
    Upload {
        schema: Arc<str>,
        attempt: u32,
        at: DateTime<Utc>,
    },
    /// The database accepted the schema
    Uploaded {
        schema: Arc<str>,
        attempt: u32,
        at: DateTime<Utc>,
    },
    /// The attempt failed and another one is scheduled after the retry delay
    Retry {
        schema: Arc<str>,
        attempt: u32,
        error: GatewayError,
        at: DateTime<Utc>,
    },
}

impl SchemaEvent {
    /// The schema text this event refers to
    pub fn schema(&self) -> &str {
        match self {
            SchemaEvent::Upload { schema, .. }
            | SchemaEvent::Uploaded { schema, .. }
            | SchemaEvent::Retry { schema, .. } => schema,
        }
    }

    pub fn attempt(&self) -> u32 {
        match self {
            SchemaEvent::Upload { attempt, .. }
            | SchemaEvent::Uploaded { attempt, .. }
            | SchemaEvent::Retry { attempt, .. } => *attempt,
        }
    }
}

/// Event bus for schema lifecycle notifications
#[derive(Clone)]
pub struct SchemaEvents {
    sender: broadcast::Sender<SchemaEvent>,
}

impl SchemaEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(64);
        Self { sender }
    }

    /// Publish an event to all current subscribers
    pub fn publish(&self, event: SchemaEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchemaEvent> {
        self.sender.subscribe()
    }
}

impl Default for SchemaEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// Log every lifecycle event until the bus closes
pub fn spawn_event_logger(mut events: broadcast::Receiver<SchemaEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(SchemaEvent::Upload { schema, attempt, .. }) => {
                    info!("📤 Uploading schema ({} bytes), attempt {}", schema.len(), attempt);
                }
                Ok(SchemaEvent::Uploaded { attempt, .. }) => {
                    info!("✅ Schema has been uploaded! (attempt {})", attempt);
                }
                Ok(SchemaEvent::Retry { attempt, error, .. }) => {
                    warn!("🔁 Schema upload attempt {} failed, retrying: {}", attempt, error);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Schema event logger skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
