//! Ingress policies (`status.ingressPolicies` / `spec.ingressPolicies`)
//!
//! An ingress policy is identified by its `ingress_from` and `ingress_to`
//! blocks together; `title` is descriptive and not part of the identity.

use super::common::{
    self, expand_operations, expand_sources, flatten_operations, flatten_sources, non_empty,
    normalize_identity_type, sort_by_config_order, validate_enum, ApiOperation, Source,
    IDENTITY_TYPES,
};
use super::Section;
use crate::error::Result;
use crate::nested::{FieldPath, NestedResource};
use serde::{Deserialize, Serialize};

/// Ingress policy as written in configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngressPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_from: Option<IngressFrom>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_to: Option<IngressTo>,
}

/// Conditions on the source of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngressFrom {
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
}

/// Conditions on the operation and destination of a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngressTo {
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
    pub operations: Vec<ApiOperation>,
}

impl IngressFrom {
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
        };
        let empty = from.identity_type.is_none() && from.identities.is_empty() && from.sources.is_empty();
        (!empty).then_some(from)
    }
}

impl IngressTo {
    fn normalized(&self) -> Option<Self> {
        let to = Self {
            resources: self.resources.clone(),
            operations: self
                .operations
                .iter()
                .map(ApiOperation::normalized)
                .filter(|op| !op.is_empty())
                .collect(),
        };
        (!(to.resources.is_empty() && to.operations.is_empty())).then_some(to)
    }
}

impl IngressPolicy {
    /// Canonical form: empty strings and blocks collapse to absent
    pub fn normalized(&self) -> Self {
        Self {
            title: non_empty(&self.title),
            ingress_from: self.ingress_from.as_ref().and_then(IngressFrom::normalized),
            ingress_to: self.ingress_to.as_ref().and_then(IngressTo::normalized),
        }
    }
}

/// Wire shapes
pub mod api {
    use super::common::api::{ApiOperation, Source};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct IngressPolicy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub ingress_from: Option<IngressFrom>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub ingress_to: Option<IngressTo>,
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct IngressFrom {
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
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct IngressTo {
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
        pub operations: Vec<ApiOperation>,
    }
}

/// Identity of an ingress policy within its perimeter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressKey {
    pub from: Option<IngressFrom>,
    pub to: Option<IngressTo>,
}

/// Ingress policies of one perimeter section
#[derive(Debug, Clone, Copy)]
pub struct IngressPolicyResource {
    section: Section,
}

impl IngressPolicyResource {
    pub fn new(section: Section) -> Self {
        Self { section }
    }

    fn expand_from(from: &IngressFrom) -> Option<api::IngressFrom> {
        let out = api::IngressFrom {
            identity_type: non_empty(&from.identity_type),
            identities: from.identities.clone(),
            sources: expand_sources(&from.sources),
        };
        let empty = out.identity_type.is_none() && out.identities.is_empty() && out.sources.is_empty();
        (!empty).then_some(out)
    }

    fn expand_to(to: &IngressTo) -> Option<api::IngressTo> {
        let out = api::IngressTo {
            resources: to.resources.clone(),
            operations: expand_operations(&to.operations),
        };
        (!(out.resources.is_empty() && out.operations.is_empty())).then_some(out)
    }

    fn flatten_from(from: &api::IngressFrom) -> Option<IngressFrom> {
        IngressFrom {
            identity_type: normalize_identity_type(&from.identity_type),
            identities: from.identities.clone(),
            sources: flatten_sources(&from.sources),
        }
        .normalized()
    }

    fn flatten_to(to: &api::IngressTo, config: Option<&IngressTo>) -> Option<IngressTo> {
        let config_resources = config.map(|c| c.resources.as_slice()).unwrap_or_default();
        IngressTo {
            resources: sort_by_config_order(config_resources, &to.resources),
            operations: flatten_operations(&to.operations),
        }
        .normalized()
    }
}

impl NestedResource for IngressPolicyResource {
    type Local = IngressPolicy;
    type Api = api::IngressPolicy;
    type Key = IngressKey;

    fn kind(&self) -> &'static str {
        match self.section {
            Section::Status => "ServicePerimeterIngressPolicy",
            Section::Spec => "ServicePerimeterDryRunIngressPolicy",
        }
    }

    fn field_path(&self) -> FieldPath {
        FieldPath::new(self.section.field(), "ingressPolicies")
    }

    fn validate(&self, local: &IngressPolicy) -> Result<()> {
        if let Some(from) = &local.ingress_from {
            validate_enum("ingress_from.identity_type", &from.identity_type, IDENTITY_TYPES)?;
        }
        Ok(())
    }

    fn expand(&self, local: &IngressPolicy) -> Result<api::IngressPolicy> {
        Ok(api::IngressPolicy {
            title: non_empty(&local.title),
            ingress_from: local.ingress_from.as_ref().and_then(Self::expand_from),
            ingress_to: local.ingress_to.as_ref().and_then(Self::expand_to),
        })
    }

    fn flatten(&self, api: &api::IngressPolicy, config: &IngressPolicy) -> IngressPolicy {
        IngressPolicy {
            title: non_empty(&api.title),
            ingress_from: api.ingress_from.as_ref().and_then(Self::flatten_from),
            ingress_to: api
                .ingress_to
                .as_ref()
                .and_then(|to| Self::flatten_to(to, config.ingress_to.as_ref())),
        }
    }

    fn match_key(&self, local: &IngressPolicy) -> IngressKey {
        IngressKey {
            from: local.ingress_from.clone(),
            to: local.ingress_to.clone(),
        }
    }

    fn normalize(&self, local: &IngressPolicy) -> IngressPolicy {
        local.normalized()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::common::MethodSelector;
    use proptest::prelude::*;
    use serde_json::json;

    fn resource() -> IngressPolicyResource {
        IngressPolicyResource::new(Section::Status)
    }

    #[test]
    fn test_expand_uses_api_field_names() {
        let local: IngressPolicy = serde_yaml::from_str(
            r#"
ingress_from:
  identity_type: ANY_IDENTITY
  sources:
    - access_level: accessPolicies/1/accessLevels/corp
ingress_to:
  resources: ["*"]
  operations:
    - service_name: storage.googleapis.com
      method_selectors:
        - method: google.storage.objects.create
"#,
        )
        .unwrap();

        let api = serde_json::to_value(resource().expand(&local).unwrap()).unwrap();
        assert_eq!(
            api,
            json!({
                "ingressFrom": {
                    "identityType": "ANY_IDENTITY",
                    "sources": [{"accessLevel": "accessPolicies/1/accessLevels/corp"}]
                },
                "ingressTo": {
                    "resources": ["*"],
                    "operations": [{
                        "serviceName": "storage.googleapis.com",
                        "methodSelectors": [{"method": "google.storage.objects.create"}]
                    }]
                }
            })
        );
    }

    #[test]
    fn test_unknown_config_fields_are_rejected() {
        let parsed: std::result::Result<IngressPolicy, _> =
            serde_yaml::from_str("ingress_from:\n  identitytype: ANY_IDENTITY\n");
        assert!(parsed.is_err());
    }

    #[test]
    fn test_empty_blocks_are_omitted() {
        let local = IngressPolicy {
            ingress_from: Some(IngressFrom {
                identity_type: Some(String::new()),
                ..Default::default()
            }),
            ingress_to: Some(IngressTo::default()),
            ..Default::default()
        };
        let api = serde_json::to_value(resource().expand(&local).unwrap()).unwrap();
        assert_eq!(api, json!({}));
    }

    #[test]
    fn test_flatten_treats_unspecified_identity_type_as_unset() {
        let api: api::IngressPolicy = serde_json::from_value(json!({
            "ingressFrom": {
                "identityType": "IDENTITY_TYPE_UNSPECIFIED",
                "identities": ["user:a@example.com"]
            }
        }))
        .unwrap();
        let local = resource().flatten(&api, &IngressPolicy::default());
        let from = local.ingress_from.unwrap();
        assert_eq!(from.identity_type, None);
        assert_eq!(from.identities, vec!["user:a@example.com".to_string()]);
    }

    #[test]
    fn test_null_lists_in_response_decode_as_empty() {
        let api: api::IngressPolicy = serde_json::from_value(json!({
            "ingressFrom": {"identityType": "ANY_IDENTITY", "identities": null, "sources": null},
            "ingressTo": {"resources": null, "operations": null}
        }))
        .unwrap();
        let local = resource().flatten(&api, &IngressPolicy::default());
        let from = local.ingress_from.unwrap();
        assert_eq!(from.identity_type.as_deref(), Some("ANY_IDENTITY"));
        assert!(from.identities.is_empty());
        assert!(from.sources.is_empty());
    }

    #[test]
    fn test_title_is_not_part_of_identity() {
        let a = IngressPolicy {
            title: Some("one".into()),
            ingress_from: Some(IngressFrom {
                identity_type: Some("ANY_IDENTITY".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let mut b = a.clone();
        b.title = Some("two".into());
        assert_eq!(resource().match_key(&a), resource().match_key(&b));
    }

    #[test]
    fn test_validate_identity_type() {
        let mut local = IngressPolicy {
            ingress_from: Some(IngressFrom {
                identity_type: Some("ANY_SERVICE_ACCOUNT".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(resource().validate(&local).is_ok());
        local.ingress_from.as_mut().unwrap().identity_type = Some("ANYONE".into());
        assert!(resource().validate(&local).is_err());
    }

    #[test]
    fn test_sections_have_distinct_kinds_and_masks() {
        let dry = IngressPolicyResource::new(Section::Spec);
        assert_eq!(dry.field_path().update_mask(), "spec.ingressPolicies");
        assert_eq!(resource().field_path().update_mask(), "status.ingressPolicies");
        assert_ne!(dry.kind(), resource().kind());
    }

    fn arb_opt_string() -> impl Strategy<Value = Option<String>> {
        prop_oneof![Just(None), Just(Some(String::new())), "[a-z*./]{1,12}".prop_map(Some)]
    }

    fn arb_source() -> impl Strategy<Value = Source> {
        (arb_opt_string(), arb_opt_string())
            .prop_map(|(access_level, resource)| Source { access_level, resource })
    }

    fn arb_operation() -> impl Strategy<Value = ApiOperation> {
        (
            arb_opt_string(),
            prop::collection::vec(
                (arb_opt_string(), arb_opt_string())
                    .prop_map(|(method, permission)| MethodSelector { method, permission }),
                0..3,
            ),
        )
            .prop_map(|(service_name, method_selectors)| ApiOperation {
                service_name,
                method_selectors,
            })
    }

    fn arb_policy() -> impl Strategy<Value = IngressPolicy> {
        let from = (
            prop_oneof![
                Just(None),
                Just(Some(String::new())),
                Just(Some("ANY_IDENTITY".to_string())),
                Just(Some("ANY_USER_ACCOUNT".to_string())),
            ],
            prop::collection::vec("user:[a-z]{1,6}@example.com", 0..3),
            prop::collection::vec(arb_source(), 0..3),
        )
            .prop_map(|(identity_type, identities, sources)| IngressFrom {
                identity_type,
                identities,
                sources,
            });
        let to = (
            prop::collection::vec("projects/[0-9]{1,4}|\\*", 0..4),
            prop::collection::vec(arb_operation(), 0..3),
        )
            .prop_map(|(resources, operations)| IngressTo { resources, operations });

        (arb_opt_string(), prop::option::of(from), prop::option::of(to)).prop_map(
            |(title, ingress_from, ingress_to)| IngressPolicy {
                title,
                ingress_from,
                ingress_to,
            },
        )
    }

    proptest! {
        #[test]
        fn flatten_expand_round_trips(policy in arb_policy()) {
            let r = resource();
            let api = r.expand(&policy).unwrap();
            prop_assert_eq!(r.flatten(&api, &policy), policy.normalized());
        }

        #[test]
        fn flatten_is_insensitive_to_server_resource_order(policy in arb_policy()) {
            let r = resource();
            let mut api = r.expand(&policy).unwrap();
            if let Some(to) = api.ingress_to.as_mut() {
                to.resources.reverse();
            }
            prop_assert_eq!(r.flatten(&api, &policy), policy.normalized());
        }
    }
}
