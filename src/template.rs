//! `{{var}}` templating for URLs, lock names and ids

use crate::error::{Error, Result};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

/// Variables available to templates
pub type Vars<'a> = HashMap<&'a str, &'a str>;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*(\w*)\s*\}\}").expect("placeholder pattern is valid"));

static PERIMETER_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^accessPolicies/[^/]+/servicePerimeters/[^/]+$").expect("perimeter pattern is valid")
});

/// Replace every `{{name}}` placeholder in `template` from `vars`.
/// An unknown or empty variable is an error rather than an empty substitution.
pub fn replace_vars(template: &str, vars: &Vars<'_>) -> Result<String> {
    if PLACEHOLDER.replace_all(template, "").contains("{{") {
        return Err(Error::Template(format!("unterminated placeholder in {template:?}")));
    }

    let mut missing = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| {
        let name = &caps[1];
        match vars.get(name) {
            Some(value) if !value.is_empty() => (*value).to_string(),
            _ => {
                missing.push(format!("{{{{{name}}}}}"));
                String::new()
            },
        }
    });

    if !missing.is_empty() {
        return Err(Error::Template(format!(
            "no value for {} in {template:?}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

/// Reduce a self-link or resource name to the bare resource name.
///
/// `https://accesscontextmanager.googleapis.com/v1/accessPolicies/1/servicePerimeters/p`
/// and `accessPolicies/1/servicePerimeters/p` name the same perimeter.
pub fn resource_name(name_or_self_link: &str) -> String {
    let trimmed = name_or_self_link.trim().trim_matches('/');
    match trimmed.find("accessPolicies/") {
        Some(idx) => trimmed[idx..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Check that a name has the `accessPolicies/{policy}/servicePerimeters/{perimeter}` form
pub fn validate_perimeter_name(name: &str) -> Result<()> {
    let valid = PERIMETER_NAME.is_match(name);
    if valid {
        Ok(())
    } else {
        Err(Error::invalid_config(format!(
            "perimeter {name:?} must look like accessPolicies/{{policy}}/servicePerimeters/{{name}}"
        )))
    }
}
