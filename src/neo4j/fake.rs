// Scripted in-memory upstream for engine and server tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::time::Instant;

use super::{GraphQLUpstream, UpstreamRequest};
use crate::{GatewayError, Result};

/// One recorded call to the fake
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub path: String,
    pub body: Option<String>,
    pub at: Instant,
}

/// Answers calls from a queue of scripted replies, falling back to a fixed reply when empty
pub struct ScriptedUpstream {
    replies: Mutex<VecDeque<Result<Value>>>,
    fallback: Result<Value>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedUpstream {
    /// Always answer with `reply`
    pub fn always(reply: Result<Value>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            fallback: reply,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answer with `replies` in order, then with `fallback` forever
    pub fn scripted(replies: Vec<Result<Value>>, fallback: Result<Value>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail `failures` times with a 503, then succeed with `success`
    pub fn failing_then(failures: usize, success: Value) -> Self {
        let replies = (0..failures)
            .map(|_| Err(GatewayError::upstream(503, "Service Unavailable")))
            .collect();
        Self::scripted(replies, Ok(success))
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|call| call.path == path).count()
    }
}

#[async_trait]
impl GraphQLUpstream for ScriptedUpstream {
    async fn execute(&self, path: &str, request: UpstreamRequest) -> Result<Value> {
        self.calls.lock().unwrap().push(RecordedCall {
            path: path.to_string(),
            body: request.body,
            at: Instant::now(),
        });

        let reply = self.replies.lock().unwrap().pop_front();
        reply.unwrap_or_else(|| self.fallback.clone())
    }
}
