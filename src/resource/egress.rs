//! Egress policies (`status.egressPolicies` / `spec.egressPolicies`)

use super::common::{
    self, expand_operations, expand_sources, flatten_operations, flatten_sources, non_empty,
    normalize_identity_type, sort_by_config_order, validate_enum, ApiOperation, Source,
    IDENTITY_TYPES,
};
use super::Section;
use crate::error::{Error, Result};
use crate::nested::{FieldPath, NestedResource};
use serde::{Deserialize, Serialize};

/// Allowed `source_restriction` values
pub const SOURCE_RESTRICTIONS: &[&str] = &["SOURCE_RESTRICTION_ENABLED", "SOURCE_RESTRICTION_DISABLED", ""];

/// What the API reports when no restriction was set
const SOURCE_RESTRICTION_UNSPECIFIED: &str = "SOURCE_RESTRICTION_UNSPECIFIED";

/// Egress policy as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EgressPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_from: Option<EgressFrom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egress_to: Option<EgressTo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EgressFrom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "crate::resource::common::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub identities: Vec<String>,
    #[serde(
        default,
        deserialize_with = "crate::resource::common::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sources: Vec<Source>,
    /// Whether `sources` are enforced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_restriction: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EgressTo {
    #[serde(
        default,
        deserialize_with = "crate::resource::common::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub resources: Vec<String>,
    /// Resources outside Google Cloud, e.g. `s3://bucket/path`
    #[serde(
        default,
        deserialize_with = "crate::resource::common::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub external_resources: Vec<String>,
    #[serde(
        default,
        deserialize_with = "crate::resource::common::null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub operations: Vec<ApiOperation>,
}

fn normalize_source_restriction(value: &Option<String>) -> Option<String> {
    non_empty(value).filter(|s| s != SOURCE_RESTRICTION_UNSPECIFIED)
}

impl EgressFrom {
    fn is_empty(&self) -> bool {
        self.identity_type.is_none()
            && self.identities.is_empty()
            && self.sources.is_empty()
            && self.source_restriction.is_none()
    }

    fn normalized(&self) -> Option<Self> {
        let from = Self {
            identity_type: normalize_identity_type(&self.identity_type),
            identities: self.identities.clone(),
            sources: self
                .sources
                .iter()
                .map(Source::normalized)
                .filter(|s| !s.is_empty())
                .collect(),
            source_restriction: normalize_source_restriction(&self.source_restriction),
        };
        (!from.is_empty()).then_some(from)
    }
}

impl EgressTo {
    fn is_empty(&self) -> bool {
        self.resources.is_empty() && self.external_resources.is_empty() && self.operations.is_empty()
    }

    fn normalized(&self) -> Option<Self> {
        let to = Self {
            resources: self.resources.clone(),
            external_resources: self.external_resources.clone(),
            operations: self
                .operations
                .iter()
                .map(ApiOperation::normalized)
                .filter(|op| !op.is_empty())
                .collect(),
        };
        (!to.is_empty()).then_some(to)
    }
}

impl EgressPolicy {
    pub fn normalized(&self) -> Self {
        Self {
            title: non_empty(&self.title),
            egress_from: self.egress_from.as_ref().and_then(EgressFrom::normalized),
            egress_to: self.egress_to.as_ref().and_then(EgressTo::normalized),
        }
    }
}

pub mod api {
    use super::common::api::{ApiOperation, Source};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EgressPolicy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub egress_from: Option<EgressFrom>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub egress_to: Option<EgressTo>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EgressFrom {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub identity_type: Option<String>,
        #[serde(
            default,
            deserialize_with = "crate::resource::common::null_as_empty",
            skip_serializing_if = "Vec::is_empty"
        )]
        pub identities: Vec<String>,
        #[serde(
            default,
            deserialize_with = "crate::resource::common::null_as_empty",
            skip_serializing_if = "Vec::is_empty"
        )]
        pub sources: Vec<Source>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub source_restriction: Option<String>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct EgressTo {
        #[serde(
            default,
            deserialize_with = "crate::resource::common::null_as_empty",
            skip_serializing_if = "Vec::is_empty"
        )]
        pub resources: Vec<String>,
        #[serde(
            default,
            deserialize_with = "crate::resource::common::null_as_empty",
            skip_serializing_if = "Vec::is_empty"
        )]
        pub external_resources: Vec<String>,
        #[serde(
            default,
            deserialize_with = "crate::resource::common::null_as_empty",
            skip_serializing_if = "Vec::is_empty"
        )]
        pub operations: Vec<ApiOperation>,
    }
}

/// Identity of an egress policy within its perimeter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EgressKey {
    pub from: Option<EgressFrom>,
    pub to: Option<EgressTo>,
}

/// Egress policies of one perimeter section
#[derive(Debug, Clone, Copy)]
pub struct EgressPolicyResource {
    section: Section,
}

impl EgressPolicyResource {
    pub fn new(section: Section) -> Self {
        Self { section }
    }
}

impl NestedResource for EgressPolicyResource {
    type Local = EgressPolicy;
    type Api = api::EgressPolicy;
    type Key = EgressKey;

    fn kind(&self) -> &'static str {
        match self.section {
            Section::Status => "ServicePerimeterEgressPolicy",
            Section::Spec => "ServicePerimeterDryRunEgressPolicy",
        }
    }

    fn field_path(&self) -> FieldPath {
        FieldPath::new(self.section.field(), "egressPolicies")
    }

    fn validate(&self, local: &EgressPolicy) -> Result<()> {
        if let Some(from) = &local.egress_from {
            validate_enum("egress_from.identity_type", &from.identity_type, IDENTITY_TYPES)?;
            validate_enum(
                "egress_from.source_restriction",
                &from.source_restriction,
                SOURCE_RESTRICTIONS,
            )?;
            let restricted = from.source_restriction.as_deref() == Some("SOURCE_RESTRICTION_ENABLED");
            if restricted && from.sources.iter().all(|s| s.normalized().is_empty()) {
                return Err(Error::invalid_config(
                    "egress_from.sources must be set when source_restriction is SOURCE_RESTRICTION_ENABLED",
                ));
            }
        }
        Ok(())
    }

    fn expand(&self, local: &EgressPolicy) -> Result<api::EgressPolicy> {
        let egress_from = local.egress_from.as_ref().and_then(|from| {
            let out = api::EgressFrom {
                identity_type: non_empty(&from.identity_type),
                identities: from.identities.clone(),
                sources: expand_sources(&from.sources),
                source_restriction: non_empty(&from.source_restriction),
            };
            let empty = out.identity_type.is_none()
                && out.identities.is_empty()
                && out.sources.is_empty()
                && out.source_restriction.is_none();
            (!empty).then_some(out)
        });
        let egress_to = local.egress_to.as_ref().and_then(|to| {
            let out = api::EgressTo {
                resources: to.resources.clone(),
                external_resources: to.external_resources.clone(),
                operations: expand_operations(&to.operations),
            };
            let empty =
                out.resources.is_empty() && out.external_resources.is_empty() && out.operations.is_empty();
            (!empty).then_some(out)
        });

        Ok(api::EgressPolicy {
            title: non_empty(&local.title),
            egress_from,
            egress_to,
        })
    }

    fn flatten(&self, api: &api::EgressPolicy, config: &EgressPolicy) -> EgressPolicy {
        let config_to = config.egress_to.as_ref();
        let egress_from = api.egress_from.as_ref().and_then(|from| {
            EgressFrom {
                identity_type: normalize_identity_type(&from.identity_type),
                identities: from.identities.clone(),
                sources: flatten_sources(&from.sources),
                source_restriction: normalize_source_restriction(&from.source_restriction),
            }
            .normalized()
        });
        let egress_to = api.egress_to.as_ref().and_then(|to| {
            let resources = config_to.map(|c| c.resources.as_slice()).unwrap_or_default();
            let external = config_to
                .map(|c| c.external_resources.as_slice())
                .unwrap_or_default();
            EgressTo {
                resources: sort_by_config_order(resources, &to.resources),
                external_resources: sort_by_config_order(external, &to.external_resources),
                operations: flatten_operations(&to.operations),
            }
            .normalized()
        });

        EgressPolicy {
            title: non_empty(&api.title),
            egress_from,
            egress_to,
        }
    }

    fn match_key(&self, local: &EgressPolicy) -> EgressKey {
        EgressKey {
            from: local.egress_from.clone(),
            to: local.egress_to.clone(),
        }
    }

    fn normalize(&self, local: &EgressPolicy) -> EgressPolicy {
        local.normalized()
    }
}
