//! Named mutexes keyed by parent resource
//!
//! Every read-modify-write of a parent's list holds the parent's lock from the
//! initial GET until the PATCH operation completes. Locks are in-process only.

use crate::error::{Error, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Held while a parent is being mutated; released on drop
#[derive(Debug)]
pub struct LockGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        tracing::debug!("Unlocking {:?}", self.key);
    }
}

/// Registry of named locks.
///
/// Constructed explicitly and shared through an `Arc`. Map shards are only
/// locked while looking up an entry, never across an await.
#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<AsyncMutex<()>>>,
    timeout: Option<Duration>,
}

impl LockRegistry {
    /// Acquisition waits as long as it takes
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquisition fails with [`Error::LockTimeout`] after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout: Some(timeout),
        }
    }

    fn entry(&self, key: &str) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .value()
            .clone()
    }

    /// Lock `key`, waiting for any other holder to release it
    pub async fn lock(&self, key: &str) -> Result<LockGuard> {
        let mutex = self.entry(key);
        tracing::debug!("Locking {:?}", key);

        let guard = match self.timeout {
            None => mutex.lock_owned().await,
            Some(timeout) => tokio::time::timeout(timeout, mutex.lock_owned())
                .await
                .map_err(|_| Error::LockTimeout {
                    key: key.to_string(),
                    timeout,
                })?,
        };

        tracing::debug!("Locked {:?}", key);
        Ok(LockGuard {
            key: key.to_string(),
            _guard: guard,
        })
    }

    /// Number of distinct keys ever locked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
