//! Transport abstraction
//!
//! The nested lifecycle only needs "send a JSON request, get JSON back, and
//! tell me if it was a 404". [`Transport`] is that seam; [`GcpClient`] is the
//! production implementation and tests substitute an in-memory fake.
//!
//! [`GcpClient`]: super::client::GcpClient

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// HTTP methods used against parent resources and operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Patch,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Patch => f.write_str("PATCH"),
        }
    }
}

/// A single JSON API request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub timeout: Option<Duration>,
}

impl ApiRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
            timeout: None,
        }
    }

    pub fn patch(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Patch,
            url: url.into(),
            body: Some(body),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Sends authenticated JSON requests.
///
/// Implementations own retry/backoff. Non-success statuses must surface as
/// [`Error::Api`](crate::error::Error::Api) so callers can detect 404.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<Value>;
}

/// Append query parameters to a URL, keeping any already present
pub fn add_query_params(url: &str, params: &[(&str, &str)]) -> Result<String> {
    let mut parsed = url::Url::parse(url)
        .map_err(|e| crate::error::Error::Template(format!("invalid URL {url:?}: {e}")))?;
    {
        let mut pairs = parsed.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(parsed.to_string())
}
