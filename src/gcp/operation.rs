//! Long-running operation polling
//!
//! A PATCH on a service perimeter returns an `Operation`. The poller fetches
//! `{base_path}{operation.name}` until `done` is set, then returns the
//! operation's `response` or surfaces its `error`.

use super::transport::{ApiRequest, Transport};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const INITIAL_POLL_INTERVAL: Duration = Duration::from_secs(1);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Waits for a long-running operation to finish
#[async_trait]
pub trait OperationWaiter: Send + Sync {
    /// Returns the final resource carried in the operation's `response`
    async fn wait(&self, operation: Value, activity: &str, timeout: Duration) -> Result<Value>;
}

/// Observed state of an operation
#[derive(Debug, Clone, PartialEq)]
pub enum OperationState {
    Running,
    Done(Value),
    Failed(String),
}

impl OperationState {
    /// Classify an operation JSON body
    pub fn of(operation: &Value) -> Self {
        let done = operation
            .get("done")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if !done {
            return OperationState::Running;
        }

        if let Some(error) = operation.get("error").filter(|e| !e.is_null()) {
            let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return OperationState::Failed(format!("code {code}: {message}"));
        }

        OperationState::Done(
            operation
                .get("response")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
        )
    }
}

/// Polls operations through a [`Transport`]
pub struct OperationPoller {
    transport: Arc<dyn Transport>,
    base_path: String,
    initial_interval: Duration,
    max_interval: Duration,
}

impl OperationPoller {
    pub fn new(transport: Arc<dyn Transport>, base_path: &str) -> Self {
        Self {
            transport,
            base_path: super::client::normalize_base_path(base_path),
            initial_interval: INITIAL_POLL_INTERVAL,
            max_interval: MAX_POLL_INTERVAL,
        }
    }

    pub fn with_intervals(mut self, initial: Duration, max: Duration) -> Self {
        self.initial_interval = initial;
        self.max_interval = max.max(initial);
        self
    }

    async fn poll_until_done(&self, mut operation: Value, activity: &str) -> Result<Value> {
        let mut interval = self.initial_interval;

        loop {
            match OperationState::of(&operation) {
                OperationState::Done(response) => return Ok(response),
                OperationState::Failed(message) => {
                    return Err(Error::OperationFailed {
                        activity: activity.to_string(),
                        message,
                    })
                },
                OperationState::Running => {},
            }

            let name = operation
                .get("name")
                .and_then(|n| n.as_str())
                .ok_or_else(|| Error::malformed("operation is not done and has no name"))?
                .to_string();

            tracing::debug!("Waiting {:?} for operation {} ({})", interval, name, activity);
            tokio::time::sleep(interval).await;
            interval = (interval * 2).min(self.max_interval);

            let url = format!("{}{}", self.base_path, name.trim_start_matches('/'));
            operation = self.transport.send(ApiRequest::get(url)).await?;
        }
    }
}

#[async_trait]
impl OperationWaiter for OperationPoller {
    async fn wait(&self, operation: Value, activity: &str, timeout: Duration) -> Result<Value> {
        match tokio::time::timeout(timeout, self.poll_until_done(operation, activity)).await {
            Ok(result) => result,
            Err(_) => Err(Error::OperationTimeout {
                activity: activity.to_string(),
                timeout,
            }),
        }
    }
}
