//! Service perimeter sub-resources
//!
//! Each kind here implements [`NestedResource`](crate::nested::NestedResource)
//! for one list on an Access Context Manager service perimeter. Every kind
//! exists in an enforced (`status`) and a dry-run (`spec`) flavour.
//!
//! - [`ingress`] - `ingressPolicies`
//! - [`egress`] - `egressPolicies`
//! - [`perimeter_resource`] - `resources` (project numbers / VPC networks)

pub mod common;
pub mod egress;
pub mod ingress;
pub mod perimeter_resource;

use std::fmt;

/// Which copy of the perimeter configuration to mutate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    /// Enforced configuration
    Status,
    /// Dry-run configuration
    Spec,
}

impl Section {
    pub fn field(self) -> &'static str {
        match self {
            Section::Status => "status",
            Section::Spec => "spec",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field())
    }
}
