//! HTTP utilities for GCP REST API calls

use super::transport::{ApiRequest, Method};
use crate::error::{Error, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Attempts per request, including the first one
const MAX_ATTEMPTS: u32 = 3;

/// Delay before the first retry; doubled on each subsequent retry
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Header naming the project that is billed for the request
const USER_PROJECT_HEADER: &str = "X-Goog-User-Project";

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let char_count = body.chars().count();
    let truncated = if char_count > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Pull `error.message` out of a Google API error envelope
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(|s| s.to_string())
        })
        .unwrap_or_default()
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = Client::builder().user_agent(user_agent).build()?;

        Ok(Self {
            client,
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Override the retry policy (mostly useful in tests)
    pub fn with_retry(mut self, max_attempts: u32, initial_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.initial_backoff = initial_backoff;
        self
    }

    /// Send a request, retrying throttling and server errors with backoff
    pub async fn send(
        &self,
        request: &ApiRequest,
        token: &str,
        billing_project: Option<&str>,
    ) -> Result<Value> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            match self.send_once(request, token, billing_project).await {
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    tracing::warn!(
                        "{} {} failed (attempt {}/{}): {}, retrying in {:?}",
                        request.method,
                        request.url,
                        attempt,
                        self.max_attempts,
                        err,
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                },
                other => return other,
            }
        }
    }

    async fn send_once(
        &self,
        request: &ApiRequest,
        token: &str,
        billing_project: Option<&str>,
    ) -> Result<Value> {
        tracing::debug!("{} {}", request.method, request.url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Patch => self.client.patch(&request.url),
        }
        .bearer_auth(token);

        if let Some(project) = billing_project {
            builder = builder.header(USER_PROJECT_HEADER, project);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(Error::Api {
                status: status.as_u16(),
                message: extract_error_message(&body),
            });
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.contains("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_handles_multibyte_boundary() {
        // 300 chars but 600 bytes; truncation counts chars
        let body = format!("ok{}", "é".repeat(298));
        let out = sanitize_for_log(&body);
        assert!(out.starts_with("ok"));
        assert!(out.ends_with("... [truncated, 598 bytes total]"));

        let short = "é".repeat(150);
        assert_eq!(sanitize_for_log(&short), "");
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_extract_error_message() {
        let body = r#"{"error":{"code":409,"message":"perimeter is locked","status":"ABORTED"}}"#;
        assert_eq!(extract_error_message(body), "perimeter is locked");
        assert_eq!(extract_error_message("<html>"), "");
    }
}
