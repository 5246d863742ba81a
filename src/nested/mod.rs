//! List-embedded sub-resource lifecycle
//!
//! Some Google Cloud objects keep their children as elements of a list field
//! on the parent (a service perimeter's `status.ingressPolicies`, for example)
//! and offer no per-element endpoints. This module manages one such element as
//! if it were an independent resource, using only GET on the parent and PATCH
//! with an update mask naming the list.
//!
//! # Architecture
//!
//! - [`accessor`] - fetches the parent and extracts the list
//! - [`matcher`] - locates an element by its match key
//! - [`encoder`] - builds parent-shaped PATCH bodies that insert, remove or
//!   replace one element
//! - [`lifecycle`] - Create/Read/Update/Delete/Import under a per-parent lock
//! - [`lock`] - the named lock registry
//!
//! Element identity is structural: there is no server-side id, so an element
//! is found again by comparing [`NestedResource::match_key`] values.

pub mod accessor;
pub mod encoder;
pub mod lifecycle;
pub mod lock;
pub mod matcher;

#[cfg(test)]
pub(crate) mod fake;

use crate::error::Result;
use crate::template::{self, Vars};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::time::Duration;

pub use lifecycle::Lifecycle;
pub use lock::LockRegistry;

/// Default timeout for create, update and delete
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// Where a list lives inside the parent body, e.g. `status.ingressPolicies`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPath {
    pub section: &'static str,
    pub list: &'static str,
}

impl FieldPath {
    pub const fn new(section: &'static str, list: &'static str) -> Self {
        Self { section, list }
    }

    /// The `updateMask` sent with every PATCH: the whole list, never element sub-paths
    pub fn update_mask(&self) -> String {
        format!("{}.{}", self.section, self.list)
    }
}

/// A kind of element stored in a parent's list.
///
/// `Local` is the user-facing snake_case shape, `Api` the camelCase wire
/// shape. `flatten(expand(x), x)` must equal `normalize(x)`.
pub trait NestedResource: Send + Sync {
    type Local: Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync;
    type Api: Clone + Debug + Serialize + DeserializeOwned + Send + Sync;
    type Key: Debug + PartialEq;

    /// Human-readable kind used in logs and errors
    fn kind(&self) -> &'static str;

    fn field_path(&self) -> FieldPath;

    /// Reject malformed configuration before any request is made
    fn validate(&self, _local: &Self::Local) -> Result<()> {
        Ok(())
    }

    fn expand(&self, local: &Self::Local) -> Result<Self::Api>;

    /// `config` supplies ordering hints (e.g. the order of `resources`)
    fn flatten(&self, api: &Self::Api, config: &Self::Local) -> Self::Local;

    /// Identity of an element, computed from its flattened form
    fn match_key(&self, local: &Self::Local) -> Self::Key;

    /// Canonical form of a configuration value
    fn normalize(&self, local: &Self::Local) -> Self::Local;

    /// Template for the local id; `{{perimeter}}` is always available
    fn id_template(&self) -> &'static str {
        "{{perimeter}}"
    }

    /// Extra template variables derived from the element
    fn id_vars(&self, _local: &Self::Local) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Split an import id into the parent name and, when the id carries it,
    /// the element itself
    fn parse_import_id(&self, id: &str) -> Result<(String, Option<Self::Local>)> {
        let perimeter = template::resource_name(id);
        template::validate_perimeter_name(&perimeter)?;
        Ok((perimeter, None))
    }

    /// Resolve the local id for an element of `perimeter`
    fn id(&self, perimeter: &str, local: &Self::Local) -> Result<String> {
        let extra = self.id_vars(local);
        let mut vars: Vars<'_> = extra.iter().map(|(k, v)| (*k, v.as_str())).collect();
        vars.insert("perimeter", perimeter);
        template::replace_vars(self.id_template(), &vars)
    }
}

/// Per-operation timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            create: DEFAULT_TIMEOUT,
            update: DEFAULT_TIMEOUT,
            delete: DEFAULT_TIMEOUT,
        }
    }
}

/// Local view of one managed element
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceData<L> {
    /// Set once the element exists; `None` means absent
    pub id: Option<String>,
    /// Parent perimeter name or self-link
    pub perimeter: String,
    /// Desired configuration
    pub config: L,
    /// Last observed server-side value, flattened
    pub state: Option<L>,
    pub timeouts: Timeouts,
}

impl<L> ResourceData<L> {
    pub fn new(perimeter: impl Into<String>, config: L) -> Self {
        Self {
            id: None,
            perimeter: perimeter.into(),
            config,
            state: None,
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    /// Forget the element locally
    pub fn clear(&mut self) {
        self.id = None;
        self.state = None;
    }
}
