//! Shapes and helpers shared by ingress and egress policies

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};

/// Allowed `identity_type` values; empty means "use `identities`"
pub const IDENTITY_TYPES: &[&str] = &["ANY_IDENTITY", "ANY_USER_ACCOUNT", "ANY_SERVICE_ACCOUNT", ""];

/// What the API reports when no identity type was set
pub const IDENTITY_TYPE_UNSPECIFIED: &str = "IDENTITY_TYPE_UNSPECIFIED";

/// A source of requests: an access level or a project/VPC
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
}

impl Source {
    pub fn is_empty(&self) -> bool {
        self.access_level.is_none() && self.resource.is_none()
    }

    pub fn normalized(&self) -> Self {
        Self {
            access_level: non_empty(&self.access_level),
            resource: non_empty(&self.resource),
        }
    }
}

/// An API method or IAM permission within a service
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission: Option<String>,
}

impl MethodSelector {
    pub fn is_empty(&self) -> bool {
        self.method.is_none() && self.permission.is_none()
    }

    pub fn normalized(&self) -> Self {
        Self {
            method: non_empty(&self.method),
            permission: non_empty(&self.permission),
        }
    }
}

/// Operations allowed on one service
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiOperation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::resource::common::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub method_selectors: Vec<MethodSelector>,
}

impl ApiOperation {
    pub fn is_empty(&self) -> bool {
        self.service_name.is_none() && self.method_selectors.is_empty()
    }

    pub fn normalized(&self) -> Self {
        Self {
            service_name: non_empty(&self.service_name),
            method_selectors: self
                .method_selectors
                .iter()
                .map(MethodSelector::normalized)
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

/// Read an explicit `null` list as empty
pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Wire shapes (camelCase, empty fields omitted)
pub mod api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Source {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub access_level: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub resource: Option<String>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MethodSelector {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub permission: Option<String>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ApiOperation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub service_name: Option<String>,
        #[serde(
            default,
            deserialize_with = "crate::resource::common::null_as_empty",
            skip_serializing_if = "Vec::is_empty"
        )]
        pub method_selectors: Vec<MethodSelector>,
    }
}

pub fn expand_sources(sources: &[Source]) -> Vec<api::Source> {
    sources
        .iter()
        .map(|s| api::Source {
            access_level: non_empty(&s.access_level),
            resource: non_empty(&s.resource),
        })
        .collect()
}

/// Empty objects coming back from the API are dropped
pub fn flatten_sources(sources: &[api::Source]) -> Vec<Source> {
    sources
        .iter()
        .map(|s| Source {
            access_level: non_empty(&s.access_level),
            resource: non_empty(&s.resource),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn expand_operations(operations: &[ApiOperation]) -> Vec<api::ApiOperation> {
    operations
        .iter()
        .map(|op| api::ApiOperation {
            service_name: non_empty(&op.service_name),
            method_selectors: op
                .method_selectors
                .iter()
                .map(|m| api::MethodSelector {
                    method: non_empty(&m.method),
                    permission: non_empty(&m.permission),
                })
                .collect(),
        })
        .collect()
}

pub fn flatten_operations(operations: &[api::ApiOperation]) -> Vec<ApiOperation> {
    operations
        .iter()
        .map(|op| ApiOperation {
            service_name: non_empty(&op.service_name),
            method_selectors: op
                .method_selectors
                .iter()
                .map(|m| MethodSelector {
                    method: non_empty(&m.method),
                    permission: non_empty(&m.permission),
                })
                .filter(|m| !m.is_empty())
                .collect(),
        })
        .filter(|op| !op.is_empty())
        .collect()
}

/// `Some("")` and `None` are the same thing
pub fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|s| !s.is_empty()).cloned()
}

/// Treat the API's "unspecified" identity type as unset
pub fn normalize_identity_type(value: &Option<String>) -> Option<String> {
    non_empty(value).filter(|s| s != IDENTITY_TYPE_UNSPECIFIED)
}

/// Reject values outside `allowed`
pub fn validate_enum(field: &str, value: &Option<String>, allowed: &[&str]) -> Result<()> {
    match value {
        Some(v) if !allowed.contains(&v.as_str()) => Err(Error::invalid_config(format!(
            "expected {} to be one of {:?}, got {:?}",
            field,
            allowed.iter().filter(|a| !a.is_empty()).collect::<Vec<_>>(),
            v
        ))),
        _ => Ok(()),
    }
}

/// Order `api` the way the user wrote `config`.
///
/// Items present in both come first in configuration order, then whatever the
/// API returned that the configuration doesn't mention, in API order.
pub fn sort_by_config_order(config: &[String], api: &[String]) -> Vec<String> {
    let mut remaining: Vec<Option<&String>> = api.iter().map(Some).collect();
    let mut sorted = Vec::with_capacity(api.len());

    for wanted in config {
        if let Some(slot) = remaining
            .iter_mut()
            .find(|slot| slot.is_some_and(|s| s == wanted))
        {
            if let Some(s) = slot.take() {
                sorted.push(s.clone());
            }
        }
    }
    sorted.extend(remaining.into_iter().flatten().cloned());

    sorted
}
