// Schema uploader
// Sends the schema document to the idl endpoint until the database accepts it

//! # Schema Uploader
//!
//! The database may still be starting when the gateway starts, so the first
//! uploads are expected to fail. The uploader keeps retrying on a fixed delay
//! with no backoff and no attempt limit.
//!
//! ## State Machine
//!
//! ```text
//! Idle ──set_schema──▶ Uploading ──ok──▶ Uploaded
//!                        ▲    │
//!                        │    └─err─▶ RetryScheduled
//!                        └──retry_delay──┘
//! ```
//!
//! `Uploaded` is terminal for a given schema. Calling `set_schema` again aborts
//! whatever task is in flight (and its retry timer), waits for it to stop, and
//! starts over from `Idle`. No state written by the old task can follow that.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use super::events::{SchemaEvent, SchemaEvents};
use super::readiness::ReadinessSignal;
use crate::neo4j::{GraphQLUpstream, UpstreamRequest, IDL_PATH};
use crate::GatewayError;

/// Fixed delay between a failed upload and the next attempt
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Schema document bundled with the gateway
pub const DEFAULT_SCHEMA: &str = include_str!("../../schema/schema.graphql");

/// Where the uploader currently is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Uploading,
    RetryScheduled,
    Uploaded,
}

/// Everything one upload task needs, cloned into the task
#[derive(Clone)]
struct UploadRun {
    upstream: Arc<dyn GraphQLUpstream>,
    events: SchemaEvents,
    readiness: Arc<ReadinessSignal>,
    state: Arc<watch::Sender<UploadState>>,
    retry_delay: Duration,
}

impl UploadRun {
    async fn upload_until_accepted(self, schema: Arc<str>) {
        let mut attempt = 1;

        loop {
            self.state.send_replace(UploadState::Uploading);
            self.events.publish(SchemaEvent::Upload {
                schema: schema.clone(),
                attempt,
                at: Utc::now(),
            });

            let request = UpstreamRequest::new().with_body(schema.to_string());
            match self.upstream.execute(IDL_PATH, request).await {
                Ok(_) => {
                    self.readiness.mark_ready();
                    self.events.publish(SchemaEvent::Uploaded {
                        schema,
                        attempt,
                        at: Utc::now(),
                    });
                    // Set last so waiters observe the flag and event already in place
                    self.state.send_replace(UploadState::Uploaded);
                    return;
                }
                Err(e) => {
                    self.state.send_replace(UploadState::RetryScheduled);
                    self.events.publish(SchemaEvent::Retry {
                        schema: schema.clone(),
                        attempt,
                        error: GatewayError::UploadFailed {
                            attempt,
                            message: e.describe(),
                        },
                        at: Utc::now(),
                    });

                    debug!("Next schema upload in {:?}", self.retry_delay);
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Uploads a schema document to the GraphQL extension, retrying until it succeeds
pub struct SchemaUploader {
    run: UploadRun,
    current: Mutex<Option<(Arc<str>, JoinHandle<()>)>>,
}

impl SchemaUploader {
    /// Create an uploader that flips `readiness` on the first successful upload
    pub fn new(upstream: Arc<dyn GraphQLUpstream>, readiness: ReadinessSignal) -> Self {
        let (state, _) = watch::channel(UploadState::Idle);

        Self {
            run: UploadRun {
                upstream,
                events: SchemaEvents::new(),
                readiness: Arc::new(readiness),
                state: Arc::new(state),
                retry_delay: DEFAULT_RETRY_DELAY,
            },
            current: Mutex::new(None),
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.run.retry_delay = retry_delay;
        self
    }

    /// Publish lifecycle events on an existing bus instead of a private one
    pub fn with_events(mut self, events: SchemaEvents) -> Self {
        self.run.events = events;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchemaEvent> {
        self.run.events.subscribe()
    }

    pub fn state(&self) -> UploadState {
        *self.run.state.borrow()
    }

    /// The schema most recently passed to [`SchemaUploader::set_schema`]
    pub async fn schema(&self) -> Option<Arc<str>> {
        self.current
            .lock()
            .await
            .as_ref()
            .map(|(schema, _)| schema.clone())
    }

    /// Start uploading `schema`, replacing any upload already in progress
    pub async fn set_schema(&self, schema: impl Into<Arc<str>>) {
        let schema = schema.into();
        let mut current = self.current.lock().await;

        if let Some((_, task)) = current.take() {
            task.abort();
            // The abort only lands at the task's next await, so it may still finish an upload
            let _ = task.await;
        }
        self.run.state.send_replace(UploadState::Idle);

        let task = tokio::spawn(self.run.clone().upload_until_accepted(schema.clone()));
        *current = Some((schema, task));
    }

    /// Wait until the current schema has been accepted
    pub async fn wait_until_uploaded(&self) {
        let mut state = self.run.state.subscribe();
        // The sender lives as long as `self`, so this only ends on success
        let _ = state.wait_for(|state| *state == UploadState::Uploaded).await;
    }
}

impl Drop for SchemaUploader {
    fn drop(&mut self) {
        if let Some((_, task)) = self.current.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::readiness::readiness;
    use crate::neo4j::fake::ScriptedUpstream;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::sync::Notify;

    const SCHEMA: &str = "type Query { hello: String }";

    fn drain(rx: &mut broadcast::Receiver<SchemaEvent>) -> Vec<SchemaEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_then_success_flip_readiness_once() {
        let upstream = Arc::new(ScriptedUpstream::failing_then(3, json!({})));
        let (signal, readiness) = readiness();
        let uploader = SchemaUploader::new(upstream.clone(), signal);
        let mut rx = uploader.subscribe();

        assert_eq!(uploader.state(), UploadState::Idle);
        uploader.set_schema(SCHEMA).await;
        uploader.wait_until_uploaded().await;

        let events = drain(&mut rx);
        let uploaded: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, SchemaEvent::Uploaded { .. }))
            .collect();
        let retries = events
            .iter()
            .filter(|e| matches!(e, SchemaEvent::Retry { .. }))
            .count();

        assert_eq!(uploaded.len(), 1);
        assert_eq!(uploaded[0].attempt(), 4);
        assert_eq!(retries, 3);
        assert!(events.iter().all(|e| e.schema() == SCHEMA));
        assert!(readiness.is_ready());
        assert_eq!(uploader.state(), UploadState::Uploaded);
        assert_eq!(upstream.calls_to(IDL_PATH), 4);
        assert!(upstream
            .calls()
            .iter()
            .all(|call| call.body.as_deref() == Some(SCHEMA)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_happens_after_fixed_delay_and_not_before() {
        let upstream = Arc::new(ScriptedUpstream::failing_then(1, json!({})));
        let (signal, readiness) = readiness();
        let uploader = SchemaUploader::new(upstream.clone(), signal);
        let mut rx = uploader.subscribe();

        uploader.set_schema(SCHEMA).await;
        assert!(matches!(rx.recv().await.unwrap(), SchemaEvent::Upload { attempt: 1, .. }));
        match rx.recv().await.unwrap() {
            SchemaEvent::Retry { attempt, error, .. } => {
                assert_eq!(attempt, 1);
                assert_eq!(error.kind(), "upload_failed");
            }
            other => panic!("expected a retry, got {:?}", other),
        }

        tokio::time::advance(Duration::from_millis(1999)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(upstream.calls_to(IDL_PATH), 1);
        assert_eq!(uploader.state(), UploadState::RetryScheduled);
        assert!(!readiness.is_ready());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(matches!(rx.recv().await.unwrap(), SchemaEvent::Upload { attempt: 2, .. }));
        assert!(matches!(rx.recv().await.unwrap(), SchemaEvent::Uploaded { attempt: 2, .. }));

        let calls = upstream.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].at - calls[0].at, DEFAULT_RETRY_DELAY);
        assert!(readiness.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_retry_delay() {
        let upstream = Arc::new(ScriptedUpstream::failing_then(2, json!({})));
        let (signal, _readiness) = readiness();
        let uploader = SchemaUploader::new(upstream.clone(), signal)
            .with_retry_delay(Duration::from_millis(250));

        uploader.set_schema(SCHEMA).await;
        uploader.wait_until_uploaded().await;

        let calls = upstream.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2].at - calls[0].at, Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_schema_replaces_pending_retry() {
        let upstream = Arc::new(ScriptedUpstream::always(Err(GatewayError::upstream(
            503,
            "Service Unavailable",
        ))));
        let (signal, _readiness) = readiness();
        let uploader = SchemaUploader::new(upstream.clone(), signal);

        uploader.set_schema("type Query { a: String }").await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        uploader.set_schema("type Query { b: String }").await;
        tokio::time::sleep(Duration::from_millis(9_000)).await;

        let calls = upstream.calls();
        let first = calls
            .iter()
            .filter(|c| c.body.as_deref() == Some("type Query { a: String }"))
            .count();
        let second = calls
            .iter()
            .filter(|c| c.body.as_deref() == Some("type Query { b: String }"))
            .count();

        assert_eq!(first, 1);
        assert_eq!(second, 5);
        assert_eq!(
            uploader.schema().await.as_deref(),
            Some("type Query { b: String }")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_survives_a_second_schema() {
        let upstream = Arc::new(ScriptedUpstream::always(Ok(json!({}))));
        let (signal, readiness) = readiness();
        let uploader = SchemaUploader::new(upstream.clone(), signal);

        uploader.set_schema(SCHEMA).await;
        uploader.wait_until_uploaded().await;
        assert!(readiness.is_ready());

        uploader.set_schema(DEFAULT_SCHEMA).await;
        uploader.wait_until_uploaded().await;
        assert!(readiness.is_ready());
        assert_eq!(upstream.calls_to(IDL_PATH), 2);
    }

    /// Blocks its worker thread while uploading the first schema, so an abort
    /// cannot land before that upload completes; every later call waits for `release`
    struct BlockingUpstream {
        first: &'static str,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl GraphQLUpstream for BlockingUpstream {
        async fn execute(&self, _path: &str, request: UpstreamRequest) -> crate::Result<Value> {
            if request.body.as_deref() == Some(self.first) {
                self.started.notify_one();
                std::thread::sleep(Duration::from_millis(100));
            } else {
                self.release.notified().await;
            }
            Ok(json!({}))
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_replaced_upload_cannot_mark_new_schema_uploaded() {
        let upstream = Arc::new(BlockingUpstream {
            first: "type Query { a: String }",
            started: Notify::new(),
            release: Notify::new(),
        });
        let (signal, _readiness) = readiness();
        let uploader = SchemaUploader::new(upstream.clone(), signal);
        let mut rx = uploader.subscribe();

        uploader.set_schema("type Query { a: String }").await;
        upstream.started.notified().await;
        uploader.set_schema("type Query { b: String }").await;

        // Long enough for the first upload to have returned
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_ne!(uploader.state(), UploadState::Uploaded);

        upstream.release.notify_one();
        uploader.wait_until_uploaded().await;

        let uploaded: Vec<_> = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, SchemaEvent::Uploaded { .. }))
            .collect();
        assert_eq!(
            uploaded.last().map(|e| e.schema()),
            Some("type Query { b: String }")
        );
        assert_eq!(uploader.state(), UploadState::Uploaded);
    }

    #[test]
    fn test_bundled_schema_declares_query_root() {
        assert!(DEFAULT_SCHEMA.contains("type Query"));
        assert!(DEFAULT_SCHEMA.contains("@relation(name: \"TAGGED_WITH\")"));
    }
}
