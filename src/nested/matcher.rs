//! Structural matching of list elements

use super::NestedResource;
use crate::error::{Error, Result};
use serde_json::Value;

/// Decode one raw list element into the resource's API shape
pub fn decode<R: NestedResource>(resource: &R, raw: &Value) -> Result<R::Api> {
    serde_json::from_value(raw.clone()).map_err(|e| {
        Error::malformed(format!(
            "could not decode {} element {}: {}",
            resource.kind(),
            raw,
            e
        ))
    })
}

/// Find the element of `elements` that denotes the same thing as `candidate`.
///
/// Both sides are flattened with `config` before their match keys are compared,
/// so server-side reordering and omitted empty fields do not break identity.
/// Returns `None` when nothing matches. Two matching elements are reported as
/// [`Error::AmbiguousMatch`].
pub fn find_index<R: NestedResource>(
    resource: &R,
    elements: &[Value],
    candidate: &R::Api,
    config: &R::Local,
) -> Result<Option<(usize, Value)>> {
    let expected = resource.match_key(&resource.flatten(candidate, config));
    let mut found: Option<(usize, Value)> = None;

    for (idx, raw) in elements.iter().enumerate() {
        if raw.is_null() {
            continue;
        }

        let item = decode(resource, raw)?;
        let key = resource.match_key(&resource.flatten(&item, config));
        if key != expected {
            tracing::debug!(
                "Skipping {} at index {} with key {:?}, looking for {:?}",
                resource.kind(),
                idx,
                key,
                expected
            );
            continue;
        }

        if let Some((first, _)) = &found {
            return Err(Error::AmbiguousMatch {
                kind: resource.kind(),
                first: *first,
                second: idx,
            });
        }
        tracing::debug!("Found {} at index {}: {}", resource.kind(), idx, raw);
        found = Some((idx, raw.clone()));
    }

    Ok(found)
}
