//! Perimeter member resources (`status.resources` / `spec.resources`)
//!
//! Elements are bare strings such as `projects/123456` or a VPC network URI,
//! so the element is its own key and the import id can carry it.

use super::Section;
use crate::error::{Error, Result};
use crate::nested::{FieldPath, NestedResource};
use crate::template;
use serde::{Deserialize, Serialize};

/// One member of a perimeter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerimeterResource {
    /// `projects/{number}` or `//compute.googleapis.com/projects/{id}/global/networks/{name}`
    pub resource: String,
}

/// Member resources of one perimeter section
#[derive(Debug, Clone, Copy)]
pub struct PerimeterResourceKind {
    section: Section,
}

impl PerimeterResourceKind {
    pub fn new(section: Section) -> Self {
        Self { section }
    }
}

impl NestedResource for PerimeterResourceKind {
    type Local = PerimeterResource;
    type Api = String;
    type Key = String;

    fn kind(&self) -> &'static str {
        match self.section {
            Section::Status => "ServicePerimeterResource",
            Section::Spec => "ServicePerimeterDryRunResource",
        }
    }

    fn field_path(&self) -> FieldPath {
        FieldPath::new(self.section.field(), "resources")
    }

    fn validate(&self, local: &PerimeterResource) -> Result<()> {
        let r = local.resource.trim();
        if r.starts_with("projects/") && r.len() > "projects/".len() || r.starts_with("//") {
            Ok(())
        } else {
            Err(Error::invalid_config(format!(
                "resource {:?} must be projects/{{number}} or a //-prefixed network URI",
                local.resource
            )))
        }
    }

    fn expand(&self, local: &PerimeterResource) -> Result<String> {
        Ok(local.resource.trim().to_string())
    }

    fn flatten(&self, api: &String, _config: &PerimeterResource) -> PerimeterResource {
        PerimeterResource {
            resource: api.clone(),
        }
    }

    fn match_key(&self, local: &PerimeterResource) -> String {
        local.resource.clone()
    }

    fn normalize(&self, local: &PerimeterResource) -> PerimeterResource {
        PerimeterResource {
            resource: local.resource.trim().to_string(),
        }
    }

    fn id_template(&self) -> &'static str {
        "{{perimeter}}/{{resource}}"
    }

    fn id_vars(&self, local: &PerimeterResource) -> Vec<(&'static str, String)> {
        vec![("resource", local.resource.trim().to_string())]
    }

    /// `accessPolicies/{policy}/servicePerimeters/{perimeter}/{resource}`;
    /// the resource itself contains slashes
    fn parse_import_id(&self, id: &str) -> Result<(String, Option<PerimeterResource>)> {
        let name = template::resource_name(id);
        let mut parts = name.splitn(5, '/');
        let perimeter: Vec<&str> = parts.by_ref().take(4).collect();
        let resource = parts.next().unwrap_or_default();

        let perimeter = perimeter.join("/");
        template::validate_perimeter_name(&perimeter)?;
        if resource.is_empty() {
            return Err(Error::invalid_config(format!(
                "import id {id:?} must look like accessPolicies/{{policy}}/servicePerimeters/{{perimeter}}/{{resource}}"
            )));
        }

        let local = PerimeterResource {
            resource: resource.to_string(),
        };
        self.validate(&local)?;
        Ok((perimeter, Some(local)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind() -> PerimeterResourceKind {
        PerimeterResourceKind::new(Section::Status)
    }

    #[test]
    fn test_parse_import_id() {
        let (perimeter, local) = kind()
            .parse_import_id("accessPolicies/1/servicePerimeters/prod/projects/42")
            .unwrap();
        assert_eq!(perimeter, "accessPolicies/1/servicePerimeters/prod");
        assert_eq!(local.unwrap().resource, "projects/42");
    }

    #[test]
    fn test_parse_import_id_with_network_uri() {
        let (_, local) = kind()
            .parse_import_id(
                "accessPolicies/1/servicePerimeters/prod///compute.googleapis.com/projects/p/global/networks/n",
            )
            .unwrap();
        assert_eq!(
            local.unwrap().resource,
            "//compute.googleapis.com/projects/p/global/networks/n"
        );
    }

    #[test]
    fn test_parse_import_id_rejects_bare_perimeter() {
        assert!(kind()
            .parse_import_id("accessPolicies/1/servicePerimeters/prod")
            .is_err());
        assert!(kind().parse_import_id("projects/42").is_err());
    }

    #[test]
    fn test_id_is_composite() {
        let id = kind()
            .id(
                "accessPolicies/1/servicePerimeters/prod",
                &PerimeterResource {
                    resource: "projects/42".into(),
                },
            )
            .unwrap();
        assert_eq!(id, "accessPolicies/1/servicePerimeters/prod/projects/42");
    }

    #[test]
    fn test_validate() {
        let ok = |r: &str| {
            kind()
                .validate(&PerimeterResource {
                    resource: r.to_string(),
                })
                .is_ok()
        };
        assert!(ok("projects/42"));
        assert!(ok("//compute.googleapis.com/projects/p/global/networks/n"));
        assert!(!ok("projects/"));
        assert!(!ok("folders/1"));
    }

    #[test]
    fn test_masks() {
        assert_eq!(kind().field_path().update_mask(), "status.resources");
        assert_eq!(
            PerimeterResourceKind::new(Section::Spec).field_path().update_mask(),
            "spec.resources"
        );
    }
}
