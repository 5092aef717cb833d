//! Path normalization for captured request URLs.
//!
//! Concrete identifiers in a captured path (`/posts/42`, `/media/0b9f...`) are replaced by
//! named placeholders so that every request against the same resource collapses onto a
//! single path template.

use crate::openapi_builder::{Parameter, ParameterLocation};
use crate::schema_inference::Schema;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Placeholder for purely numeric segments
pub const ID_PLACEHOLDER: &str = "{id}";
/// Placeholder for canonical UUID segments
pub const UUID_PLACEHOLDER: &str = "{uuid}";

fn numeric_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+$").expect("valid numeric segment regex"))
}

fn uuid_segment() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
            .expect("valid uuid segment regex")
    })
}

/// A normalized path such as `/wp/v2/posts/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathTemplate(String);

impl PathTemplate {
    /// Normalizes a raw request path into a template.
    ///
    /// Numeric segments are rewritten first, then UUID segments. Only whole segments are
    /// matched, so an already-normalized template passes through unchanged.
    pub fn normalize(raw_path: &str) -> Self {
        let numeric = numeric_segment();
        let uuid = uuid_segment();

        let segments: Vec<&str> = raw_path
            .split('/')
            .map(|segment| if numeric.is_match(segment) { ID_PLACEHOLDER } else { segment })
            .map(|segment| if uuid.is_match(segment) { UUID_PLACEHOLDER } else { segment })
            .collect();

        PathTemplate(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path parameters implied by the placeholders present in this template.
    pub fn parameters(&self) -> Vec<Parameter> {
        derive_parameters(self)
    }
}

impl fmt::Display for PathTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PathTemplate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Emits one required path parameter per placeholder kind found in the template.
///
/// `{id}` becomes an integer parameter and `{uuid}` a string parameter with the `uuid`
/// format, in that order.
pub fn derive_parameters(template: &PathTemplate) -> Vec<Parameter> {
    let mut parameters = Vec::new();

    if template.as_str().contains(ID_PLACEHOLDER) {
        parameters.push(Parameter::new(
            "id",
            ParameterLocation::Path,
            true,
            Schema::of_type("integer"),
        ));
    }

    if template.as_str().contains(UUID_PLACEHOLDER) {
        parameters.push(Parameter::new(
            "uuid",
            ParameterLocation::Path,
            true,
            Schema::of_type("string").with_format("uuid"),
        ));
    }

    parameters
}
