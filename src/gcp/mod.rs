//! GCP API interaction module
//!
//! This module provides the plumbing the nested lifecycle talks to:
//! authentication, the HTTP client, and long-running operation polling.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client, implements [`transport::Transport`]
//! - [`http`] - HTTP utilities for REST API calls (retry, error envelopes)
//! - [`operation`] - Long-running operation waiter
//! - [`transport`] - The request/response seam used by the lifecycle
//!
//! # Example
//!
//! ```ignore
//! use nestedpatch::gcp::client::{GcpClient, DEFAULT_BASE_PATH};
//! use nestedpatch::gcp::transport::{ApiRequest, Transport};
//!
//! async fn example() -> nestedpatch::Result<()> {
//!     let client = GcpClient::new(DEFAULT_BASE_PATH, "nestedpatch/0.1.0").await?;
//!     let url = format!("{}accessPolicies/123/servicePerimeters/prod", client.base_path);
//!     let perimeter = client.send(ApiRequest::get(url)).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod operation;
pub mod transport;
