//! PATCH body encoders
//!
//! Each encoder starts from the list as currently stored on the server and
//! produces the whole replacement list wrapped in the parent's shape. Elements
//! other than the target are passed through untouched, including fields the
//! typed shapes do not model.

use super::accessor::{wrap_list, ParentAccessor};
use super::matcher::find_index;
use super::NestedResource;
use crate::error::{Error, Result};
use serde_json::Value;

/// Build a body with `candidate` appended to `current`.
/// Fails with [`Error::AlreadyExists`] when an equivalent element is present.
pub fn insert_into<R: NestedResource>(
    resource: &R,
    mut current: Vec<Value>,
    candidate: &R::Api,
    config: &R::Local,
) -> Result<Value> {
    if let Some((_, existing)) = find_index(resource, &current, candidate, config)? {
        return Err(Error::AlreadyExists {
            kind: resource.kind(),
            existing: existing.to_string(),
        });
    }

    current.push(serde_json::to_value(candidate)?);
    Ok(wrap_list(resource.field_path(), current))
}

/// Build a body with the element matching `candidate` removed.
/// Returns [`Error::NotFound`] when nothing matches so deletes can treat it as done.
pub fn remove_from<R: NestedResource>(
    resource: &R,
    mut current: Vec<Value>,
    candidate: &R::Api,
    config: &R::Local,
) -> Result<Value> {
    let Some((idx, _)) = find_index(resource, &current, candidate, config)? else {
        return Err(Error::NotFound {
            kind: resource.kind(),
        });
    };

    current.remove(idx);
    Ok(wrap_list(resource.field_path(), current))
}

/// Build a body with the element matching `old` replaced by `new` in place.
///
/// When `old` is already gone, `new` is appended as a create would. `new` may
/// match the element being replaced, but not any other element.
pub fn replace_in<R: NestedResource>(
    resource: &R,
    mut current: Vec<Value>,
    old: (&R::Api, &R::Local),
    new: (&R::Api, &R::Local),
) -> Result<Value> {
    let Some((idx, _)) = find_index(resource, &current, old.0, old.1)? else {
        tracing::debug!("{} to replace is gone, appending instead", resource.kind());
        return insert_into(resource, current, new.0, new.1);
    };

    if let Some((other, existing)) = find_index(resource, &current, new.0, new.1)? {
        if other != idx {
            return Err(Error::AlreadyExists {
                kind: resource.kind(),
                existing: existing.to_string(),
            });
        }
    }

    current[idx] = serde_json::to_value(new.0)?;
    Ok(wrap_list(resource.field_path(), current))
}

/// Fetch the list and build the create body
pub async fn encode_insert<R: NestedResource>(
    accessor: &ParentAccessor<'_>,
    resource: &R,
    candidate: &R::Api,
    config: &R::Local,
) -> Result<Value> {
    let current = accessor.fetch_list().await?;
    insert_into(resource, current, candidate, config)
}

/// Fetch the list and build the delete body, or report the element already gone
pub async fn encode_remove_or_not_found<R: NestedResource>(
    accessor: &ParentAccessor<'_>,
    resource: &R,
    candidate: &R::Api,
    config: &R::Local,
) -> Result<Value> {
    let current = accessor.fetch_list().await?;
    remove_from(resource, current, candidate, config)
}

/// Fetch the list and build the in-place replacement body
pub async fn encode_replace<R: NestedResource>(
    accessor: &ParentAccessor<'_>,
    resource: &R,
    old: (&R::Api, &R::Local),
    new: (&R::Api, &R::Local),
) -> Result<Value> {
    let current = accessor.fetch_list().await?;
    replace_in(resource, current, old, new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::perimeter_resource::{PerimeterResource, PerimeterResourceKind};
    use crate::resource::Section;
    use serde_json::json;

    fn dry_run() -> PerimeterResourceKind {
        PerimeterResourceKind::new(Section::Spec)
    }

    fn res(name: &str) -> PerimeterResource {
        PerimeterResource {
            resource: name.to_string(),
        }
    }

    fn enc(kind: &PerimeterResourceKind, name: &str) -> String {
        kind.expand(&res(name)).unwrap()
    }

    #[test]
    fn test_insert_appends_at_end() {
        let kind = dry_run();
        let body = insert_into(
            &kind,
            vec![json!("projects/1"), json!("projects/2")],
            &enc(&kind, "projects/3"),
            &res("projects/3"),
        )
        .unwrap();
        assert_eq!(
            body,
            json!({"spec": {"resources": ["projects/1", "projects/2", "projects/3"]}})
        );
    }

    #[test]
    fn test_insert_rejects_existing() {
        let kind = dry_run();
        let err = insert_into(
            &kind,
            vec![json!("projects/1")],
            &enc(&kind, "projects/1"),
            &res("projects/1"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn test_remove_keeps_order_of_others() {
        let kind = dry_run();
        let body = remove_from(
            &kind,
            vec![json!("projects/1"), json!("projects/2"), json!("projects/3")],
            &enc(&kind, "projects/2"),
            &res("projects/2"),
        )
        .unwrap();
        assert_eq!(body, json!({"spec": {"resources": ["projects/1", "projects/3"]}}));
    }

    #[test]
    fn test_remove_last_element_sends_empty_list() {
        let kind = dry_run();
        let body = remove_from(
            &kind,
            vec![json!("projects/1")],
            &enc(&kind, "projects/1"),
            &res("projects/1"),
        )
        .unwrap();
        assert_eq!(body, json!({"spec": {"resources": []}}));
    }

    #[test]
    fn test_remove_missing_is_not_found() {
        let kind = dry_run();
        let err = remove_from(&kind, vec![], &enc(&kind, "projects/9"), &res("projects/9"))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_replace_in_place() {
        let kind = dry_run();
        let old = res("projects/2");
        let new = res("projects/4");
        let body = replace_in(
            &kind,
            vec![json!("projects/1"), json!("projects/2"), json!("projects/3")],
            (&enc(&kind, "projects/2"), &old),
            (&enc(&kind, "projects/4"), &new),
        )
        .unwrap();
        assert_eq!(
            body,
            json!({"spec": {"resources": ["projects/1", "projects/4", "projects/3"]}})
        );
    }

    #[test]
    fn test_replace_onto_sibling_is_rejected() {
        let kind = dry_run();
        let old = res("projects/1");
        let new = res("projects/2");
        let err = replace_in(
            &kind,
            vec![json!("projects/1"), json!("projects/2")],
            (&enc(&kind, "projects/1"), &old),
            (&enc(&kind, "projects/2"), &new),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn test_replace_missing_old_appends_new() {
        let kind = dry_run();
        let old = res("projects/7");
        let new = res("projects/8");
        let body = replace_in(
            &kind,
            vec![json!("projects/1")],
            (&enc(&kind, "projects/7"), &old),
            (&enc(&kind, "projects/8"), &new),
        )
        .unwrap();
        assert_eq!(body, json!({"spec": {"resources": ["projects/1", "projects/8"]}}));
    }

    #[test]
    fn test_replace_missing_old_onto_existing_is_rejected() {
        let kind = dry_run();
        let old = res("projects/7");
        let new = res("projects/1");
        let err = replace_in(
            &kind,
            vec![json!("projects/1")],
            (&enc(&kind, "projects/7"), &old),
            (&enc(&kind, "projects/1"), &new),
        )
        .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }
}
