//! Repair of internal `$ref` pointers.
//!
//! Hand-authored or plugin-generated specifications often point at schemas that do not
//! exist in the document. The resolver inlines the schemas it knows, strips pointers that
//! leave the component namespace and keeps everything else as is. The surrounding node is
//! never dropped.

use log::debug;
use serde_json::{json, Map, Value};

/// Prefix of pointers into the document's own components
pub const COMPONENTS_PREFIX: &str = "#/components/";

/// Prefix of pointers into `components.schemas`
pub const SCHEMAS_PREFIX: &str = "#/components/schemas/";

/// Names with a built-in schema definition
pub const CANONICAL_SCHEMAS: &[&str] = &["product"];

/// Built-in definition for a canonical schema name.
pub fn canonical_schema(name: &str) -> Option<Value> {
    match name {
        "product" => Some(json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string"},
                "slug": {"type": "string"},
                "type": {"type": "string", "enum": ["simple", "grouped", "external", "variable"]},
                "status": {"type": "string", "enum": ["draft", "pending", "private", "publish"]},
                "price": {"type": "string"},
                "regular_price": {"type": "string"},
                "sale_price": {"type": "string"},
                "description": {"type": "string"},
                "short_description": {"type": "string"},
                "sku": {"type": "string"},
                "virtual": {"type": "boolean"},
                "downloadable": {"type": "boolean"},
                "featured": {"type": "boolean"}
            }
        })),
        _ => None,
    }
}

/// Rebuilds a tree bottom-up, handing every mapping (with already rewritten children)
/// to `transform`. The input is never modified.
pub fn map_tree<F>(node: &Value, transform: &F) -> Value
where
    F: Fn(Map<String, Value>) -> Value,
{
    match node {
        Value::Object(fields) => {
            let rebuilt: Map<String, Value> = fields
                .iter()
                .map(|(key, value)| (key.clone(), map_tree(value, transform)))
                .collect();
            transform(rebuilt)
        }
        Value::Array(items) => Value::Array(items.iter().map(|item| map_tree(item, transform)).collect()),
        scalar => scalar.clone(),
    }
}

fn repair_reference(mut node: Map<String, Value>) -> Value {
    let pointer = node.get("$ref").and_then(Value::as_str).map(str::to_owned);
    let Some(pointer) = pointer else {
        return Value::Object(node);
    };

    if let Some(inlined) = pointer.strip_prefix(SCHEMAS_PREFIX).and_then(canonical_schema) {
        debug!("Inlining canonical schema for {}", pointer);
        return inlined;
    }

    if !pointer.starts_with(COMPONENTS_PREFIX) {
        debug!("Stripping unresolvable reference {}", pointer);
        node.remove("$ref");
    }

    Value::Object(node)
}

/// Reference resolver for specification documents
pub struct ReferenceResolver;

impl ReferenceResolver {
    /// Returns a copy of `spec` with canonical references inlined and references outside
    /// `#/components/` removed. Running it again on its own output changes nothing.
    pub fn resolve(spec: &Value) -> Value {
        map_tree(spec, &repair_reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_spec() -> Value {
        json!({
            "openapi": "3.0.0",
            "paths": {
                "/wc/v3/products/{id}": {
                    "get": {
                        "responses": {
                            "200": {
                                "description": "A product",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/product"}
                                    }
                                }
                            }
                        }
                    },
                    "post": {
                        "requestBody": {
                            "description": "external",
                            "$ref": "https://example.com/schemas/order.json"
                        },
                        "responses": {
                            "201": {
                                "description": "Created",
                                "content": {
                                    "application/json": {
                                        "schema": {"$ref": "#/components/schemas/order"}
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {"schemas": {"order": {"type": "object"}}},
            "x-list": [{"$ref": "#/definitions/legacy", "title": "kept"}]
        })
    }

    #[test]
    fn test_inlines_canonical_schema() {
        let resolved = ReferenceResolver::resolve(&sample_spec());
        let schema = &resolved["paths"]["/wc/v3/products/{id}"]["get"]["responses"]["200"]["content"]
            ["application/json"]["schema"];
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["sku"]["type"], "string");
        assert!(schema.get("$ref").is_none());
    }

    #[test]
    fn test_strips_external_reference_keeps_node() {
        let resolved = ReferenceResolver::resolve(&sample_spec());
        let body = &resolved["paths"]["/wc/v3/products/{id}"]["post"]["requestBody"];
        assert_eq!(body, &json!({"description": "external"}));

        assert_eq!(resolved["x-list"], json!([{"title": "kept"}]));
    }

    #[test]
    fn test_keeps_component_references() {
        let resolved = ReferenceResolver::resolve(&sample_spec());
        let schema = &resolved["paths"]["/wc/v3/products/{id}"]["post"]["responses"]["201"]["content"]
            ["application/json"]["schema"];
        assert_eq!(schema, &json!({"$ref": "#/components/schemas/order"}));
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let once = ReferenceResolver::resolve(&sample_spec());
        let twice = ReferenceResolver::resolve(&once);
        assert_eq!(
            serde_json::to_string(&once).unwrap(),
            serde_json::to_string(&twice).unwrap()
        );
    }

    #[test]
    fn test_input_is_not_modified() {
        let spec = sample_spec();
        let before = spec.clone();
        let _ = ReferenceResolver::resolve(&spec);
        assert_eq!(spec, before);
    }

    #[test]
    fn test_non_string_ref_is_left_alone() {
        let spec = json!({"properties": {"$ref": {"type": "string"}}});
        assert_eq!(ReferenceResolver::resolve(&spec), spec);
    }

    #[test]
    fn test_canonical_names_have_definitions() {
        for name in CANONICAL_SCHEMAS {
            assert!(canonical_schema(name).is_some());
        }
        assert!(canonical_schema("order").is_none());
    }
}
