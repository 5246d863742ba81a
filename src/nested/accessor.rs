//! Parent fetch and list extraction

use super::FieldPath;
use crate::error::{Error, Result};
use crate::gcp::transport::{ApiRequest, Transport};
use serde_json::{Map, Value};

/// Reads the list field of one parent resource
pub struct ParentAccessor<'a> {
    transport: &'a dyn Transport,
    url: &'a str,
    path: FieldPath,
}

impl<'a> ParentAccessor<'a> {
    pub fn new(transport: &'a dyn Transport, url: &'a str, path: FieldPath) -> Self {
        Self {
            transport,
            url,
            path,
        }
    }

    pub fn path(&self) -> FieldPath {
        self.path
    }

    /// GET the parent and return the current list. Not cached.
    pub async fn fetch_list(&self) -> Result<Vec<Value>> {
        let parent = self.transport.send(ApiRequest::get(self.url)).await?;
        extract_list(&parent, self.path)
    }
}

/// Pull `section.list` out of a parent body before building a PATCH.
///
/// A missing or null section or list is an empty list: the parent can exist
/// without any elements yet. Anything other than a list is rejected, since
/// the PATCH would otherwise overwrite it.
pub fn extract_list(parent: &Value, path: FieldPath) -> Result<Vec<Value>> {
    match list_field(parent, path)? {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(not_a_list(path, other)),
    }
}

/// Like [`extract_list`], for reads and operation responses: a lone object
/// where the list should be is taken as a one-element list.
pub fn extract_list_for_read(parent: &Value, path: FieldPath) -> Result<Vec<Value>> {
    match list_field(parent, path)? {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(item @ Value::Object(_)) => {
            tracing::debug!("Treating single {} value as a list", path.update_mask());
            Ok(vec![item.clone()])
        },
        Some(other) => Err(not_a_list(path, other)),
    }
}

fn list_field(parent: &Value, path: FieldPath) -> Result<Option<&Value>> {
    let section = match parent.get(path.section) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(section)) => section,
        Some(other) => {
            return Err(Error::malformed(format!(
                "expected object for field {:?}, got {}",
                path.section,
                json_type(other)
            )))
        },
    };

    match section.get(path.list) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(value)),
    }
}

fn not_a_list(path: FieldPath, value: &Value) -> Error {
    Error::malformed(format!(
        "expected list for nested field {:?}, got {}",
        path.update_mask(),
        json_type(value)
    ))
}

/// Wrap a list back into the parent shape it was read from
pub fn wrap_list(path: FieldPath, items: Vec<Value>) -> Value {
    let mut section = Map::new();
    section.insert(path.list.to_string(), Value::Array(items));
    let mut parent = Map::new();
    parent.insert(path.section.to_string(), Value::Object(section));
    Value::Object(parent)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nested::fake::FakeParent;
    use serde_json::json;

    const INGRESS: FieldPath = FieldPath::new("status", "ingressPolicies");

    #[test]
    fn test_missing_section_is_empty() {
        assert!(extract_list(&json!({"name": "p"}), INGRESS).unwrap().is_empty());
        assert!(extract_list(&json!({"status": null}), INGRESS).unwrap().is_empty());
    }

    #[test]
    fn test_missing_list_is_empty() {
        let parent = json!({"status": {"resources": ["projects/1"]}});
        assert!(extract_list(&parent, INGRESS).unwrap().is_empty());
    }

    #[test]
    fn test_list_is_returned_in_order() {
        let parent = json!({"status": {"ingressPolicies": [{"a": 1}, {"b": 2}]}});
        let items = extract_list(&parent, INGRESS).unwrap();
        assert_eq!(items, vec![json!({"a": 1}), json!({"b": 2})]);
    }

    #[test]
    fn test_non_list_field_is_malformed() {
        let parent = json!({"status": {"ingressPolicies": {"ingressFrom": {}}}});
        let err = extract_list(&parent, INGRESS).unwrap_err();
        assert!(matches!(err, Error::MalformedResponse(ref m) if m.contains("status.ingressPolicies")));

        let parent = json!({"status": "ACTIVE"});
        assert!(matches!(
            extract_list(&parent, INGRESS),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_read_takes_single_object_as_one_element() {
        let parent = json!({"status": {"ingressPolicies": {"ingressFrom": {}}}});
        assert_eq!(
            extract_list_for_read(&parent, INGRESS).unwrap(),
            vec![json!({"ingressFrom": {}})]
        );
        assert!(extract_list_for_read(&json!({}), INGRESS).unwrap().is_empty());

        let parent = json!({"status": {"ingressPolicies": "oops"}});
        assert!(matches!(
            extract_list_for_read(&parent, INGRESS),
            Err(Error::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_wrap_list() {
        assert_eq!(
            wrap_list(INGRESS, vec![json!({"x": 1})]),
            json!({"status": {"ingressPolicies": [{"x": 1}]}})
        );
        assert_eq!(
            wrap_list(FieldPath::new("spec", "resources"), vec![]),
            json!({"spec": {"resources": []}})
        );
    }

    #[tokio::test]
    async fn test_fetch_list_reads_through_transport() {
        let fake = FakeParent::new(json!({
            "name": "accessPolicies/1/servicePerimeters/p",
            "status": {"ingressPolicies": [{"ingressFrom": {"identityType": "ANY_IDENTITY"}}]}
        }));
        let accessor = ParentAccessor::new(&fake, fake.url(), INGRESS);
        let items = accessor.fetch_list().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(fake.gets(), 1);

        // Not cached: a second call goes back to the API
        accessor.fetch_list().await.unwrap();
        assert_eq!(fake.gets(), 2);
    }

    #[tokio::test]
    async fn test_fetch_list_propagates_not_found() {
        let fake = FakeParent::missing();
        let accessor = ParentAccessor::new(&fake, fake.url(), INGRESS);
        let err = accessor.fetch_list().await.unwrap_err();
        assert!(err.is_not_found());
    }
}
