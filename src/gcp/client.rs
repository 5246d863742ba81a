//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication
//! and HTTP functionality.

use super::auth::{GcpCredentials, TokenSource};
use super::http::GcpHttpClient;
use super::transport::{ApiRequest, Transport};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Default Access Context Manager endpoint
pub const DEFAULT_BASE_PATH: &str = "https://accesscontextmanager.googleapis.com/v1/";

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub tokens: Arc<dyn TokenSource>,
    pub http: GcpHttpClient,
    pub base_path: String,
    pub billing_project: Option<String>,
}

impl GcpClient {
    /// Create a new GCP client using Application Default Credentials
    pub async fn new(base_path: &str, user_agent: &str) -> Result<Self> {
        let credentials = GcpCredentials::new().await?;
        Self::with_token_source(Arc::new(credentials), base_path, user_agent)
    }

    /// Create a client around an explicit token source
    pub fn with_token_source(
        tokens: Arc<dyn TokenSource>,
        base_path: &str,
        user_agent: &str,
    ) -> Result<Self> {
        let http = GcpHttpClient::new(user_agent)?;

        Ok(Self {
            tokens,
            http,
            base_path: normalize_base_path(base_path),
            billing_project: None,
        })
    }

    /// Bill requests to the given project (`X-Goog-User-Project`)
    pub fn with_billing_project(mut self, project: Option<String>) -> Self {
        self.billing_project = project;
        self
    }

    /// Replace the HTTP layer (e.g. to tune retries)
    pub fn with_http(mut self, http: GcpHttpClient) -> Self {
        self.http = http;
        self
    }

}

#[async_trait]
impl Transport for GcpClient {
    async fn send(&self, request: ApiRequest) -> Result<Value> {
        let token = self.tokens.token().await?;
        self.http
            .send(&request, &token, self.billing_project.as_deref())
            .await
    }
}

/// Ensure the base path ends with exactly one slash
pub fn normalize_base_path(base_path: &str) -> String {
    format!("{}/", base_path.trim_end_matches('/'))
}
