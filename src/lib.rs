//! nestedpatch
//!
//! Manage elements of list fields on Google Cloud parent resources (service
//! perimeter ingress/egress policies and member resources) as if they were
//! independent resources, through GET and masked PATCH on the parent.

pub mod config;
pub mod error;
pub mod gcp;
pub mod nested;
pub mod resource;
pub mod template;

pub use error::{Error, Result};
