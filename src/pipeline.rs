//! Final assembly of the merged specification.
//!
//! Three partial documents feed the result:
//!
//! 1. an optional base specification (hand-authored or plugin-generated),
//! 2. the statically discovered route list,
//! 3. the capture-derived specification.
//!
//! The base and the static routes are merged first (base wins), repaired by the
//! [`ReferenceResolver`], and then laid under the capture-derived document, which acts as
//! the accumulator so observed traffic wins every conflict.

use crate::error::{Error, Result};
use crate::merger::SpecMerger;
use crate::openapi_builder::Paths;
use crate::reference_resolver::{canonical_schema, ReferenceResolver, CANONICAL_SCHEMAS};
use log::{debug, info};
use serde_json::{json, Map, Value};

fn require_mapping(label: &str, spec: &Value) -> Result<()> {
    if spec.is_object() {
        Ok(())
    } else {
        Err(Error::InvalidDocument(format!("{} specification must be a mapping", label)))
    }
}

/// Returns a copy of `spec` with the top-level fields a merge relies on.
pub fn ensure_skeleton(spec: &Value) -> Value {
    let mut fields = spec.as_object().cloned().unwrap_or_default();
    fields
        .entry("openapi")
        .or_insert_with(|| json!("3.0.0"));
    fields
        .entry("info")
        .or_insert_with(|| json!({"title": "Merged API", "version": "1.0.0"}));
    fields.entry("paths").or_insert_with(|| json!({}));
    fields.entry("components").or_insert_with(|| json!({}));
    Value::Object(fields)
}

/// Registers the canonical schemas under `components.schemas` where absent.
pub fn ensure_canonical_schemas(spec: Value) -> Value {
    let mut canonical = Map::new();
    for name in CANONICAL_SCHEMAS {
        if let Some(schema) = canonical_schema(name) {
            canonical.insert(name.to_string(), schema);
        }
    }
    let overlay = json!({"components": {"schemas": canonical}});
    SpecMerger::merge_pair(spec, &overlay)
}

/// Wraps a static route mapping as a paths-only document
pub fn static_document(paths: &Paths) -> Result<Value> {
    Ok(json!({ "paths": serde_json::to_value(paths)? }))
}

/// Builds the final document from the capture-derived spec, the static route mapping and
/// an optional base specification.
///
/// # Errors
///
/// Returns an error if the capture or base document is not a mapping.
pub fn build_final_spec(capture: &Value, static_paths: &Paths, base: Option<&Value>) -> Result<Value> {
    require_mapping("capture-derived", capture)?;
    if let Some(base) = base {
        require_mapping("base", base)?;
    }

    let base = ensure_skeleton(base.unwrap_or(&Value::Null));
    let discovered = SpecMerger::merge(&base, &[static_document(static_paths)?]);
    debug!(
        "Base plus static routes: {} paths",
        discovered["paths"].as_object().map_or(0, Map::len)
    );

    let resolved = ReferenceResolver::resolve(&discovered);

    let accumulator = ensure_canonical_schemas(capture.clone());
    let merged = SpecMerger::merge(&accumulator, &[resolved]);
    let merged = ensure_canonical_schemas(merged);

    info!(
        "Final specification has {} paths",
        merged["paths"].as_object().map_or(0, Map::len)
    );
    Ok(merged)
}
