//! In-memory parent used by unit tests

use crate::error::{Error, Result};
use crate::gcp::operation::OperationWaiter;
use crate::gcp::transport::{ApiRequest, Method, Transport};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub const PERIMETER: &str = "accessPolicies/123/servicePerimeters/prod";
pub const BASE_PATH: &str = "http://acm.test/v1/";

/// How the next operation wait should end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Done,
    Failed,
    Timeout,
}

/// A single service perimeter served from memory.
///
/// GET returns the stored body (404 when `None`), PATCH replaces the list named
/// by `updateMask`. Both yield to the scheduler so unsynchronized
/// read-modify-write cycles interleave.
pub struct FakeParent {
    parent: Mutex<Option<Value>>,
    url: String,
    gets: AtomicUsize,
    patches: Mutex<Vec<(String, Value)>>,
    wait_outcome: Mutex<WaitOutcome>,
}

impl FakeParent {
    pub fn new(parent: Value) -> Self {
        Self {
            parent: Mutex::new(Some(parent)),
            url: format!("{BASE_PATH}{PERIMETER}"),
            gets: AtomicUsize::new(0),
            patches: Mutex::new(Vec::new()),
            wait_outcome: Mutex::new(WaitOutcome::Done),
        }
    }

    pub fn empty() -> Self {
        Self::new(json!({"name": PERIMETER, "title": "prod"}))
    }

    pub fn missing() -> Self {
        let fake = Self::empty();
        *fake.parent.lock().unwrap() = None;
        fake
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn patches(&self) -> Vec<(String, Value)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn parent(&self) -> Option<Value> {
        self.parent.lock().unwrap().clone()
    }

    pub fn set_wait_outcome(&self, outcome: WaitOutcome) {
        *self.wait_outcome.lock().unwrap() = outcome;
    }

    /// Elements currently stored at `section.list`
    pub fn list(&self, section: &str, list: &str) -> Vec<Value> {
        self.parent()
            .and_then(|p| p.get(section).and_then(|s| s.get(list)).cloned())
            .and_then(|v| v.as_array().cloned())
            .unwrap_or_default()
    }

    fn apply_patch(&self, url: &str, body: &Value) -> Result<()> {
        let parsed = url::Url::parse(url).map_err(|e| Error::Template(e.to_string()))?;
        let mask = parsed
            .query_pairs()
            .find(|(k, _)| k == "updateMask")
            .map(|(_, v)| v.into_owned())
            .ok_or_else(|| Error::Api {
                status: 400,
                message: "updateMask is required".into(),
            })?;
        let (section, list) = mask.split_once('.').ok_or_else(|| Error::Api {
            status: 400,
            message: format!("unsupported mask {mask}"),
        })?;

        let new_list = body
            .get(section)
            .and_then(|s| s.get(list))
            .cloned()
            .unwrap_or(Value::Null);

        let mut guard = self.parent.lock().unwrap();
        let parent = guard.as_mut().ok_or_else(|| Error::Api {
            status: 404,
            message: "perimeter not found".into(),
        })?;
        let obj = parent.as_object_mut().expect("fake parent is an object");
        let section_value = obj
            .entry(section.to_string())
            .or_insert_with(|| json!({}));
        if section_value.is_null() {
            *section_value = json!({});
        }
        section_value
            .as_object_mut()
            .expect("fake section is an object")
            .insert(list.to_string(), new_list);
        Ok(())
    }
}

#[async_trait]
impl Transport for FakeParent {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        tokio::task::yield_now().await;
        match request.method {
            Method::Get => {
                self.gets.fetch_add(1, Ordering::SeqCst);
                let parent = self.parent();
                tokio::task::yield_now().await;
                parent.ok_or_else(|| Error::Api {
                    status: 404,
                    message: "perimeter not found".into(),
                })
            },
            Method::Patch => {
                let body = request.body.clone().unwrap_or(Value::Null);
                self.apply_patch(&request.url, &body)?;
                self.patches.lock().unwrap().push((request.url, body));
                Ok(json!({"name": "operations/fake", "done": false}))
            },
        }
    }
}

#[async_trait]
impl OperationWaiter for FakeParent {
    async fn wait(&self, _operation: Value, activity: &str, timeout: Duration) -> Result<Value> {
        tokio::task::yield_now().await;
        let outcome = *self.wait_outcome.lock().unwrap();
        match outcome {
            WaitOutcome::Done => Ok(self.parent().unwrap_or_else(|| json!({}))),
            WaitOutcome::Failed => Err(Error::OperationFailed {
                activity: activity.to_string(),
                message: "code 13: internal".into(),
            }),
            WaitOutcome::Timeout => Err(Error::OperationTimeout {
                activity: activity.to_string(),
                timeout,
            }),
        }
    }
}
