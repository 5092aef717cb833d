//! Field-level merging of partial OpenAPI specifications.
//!
//! The merge is an ordered fold: the base is copied into an accumulator and every overlay
//! fills gaps in it. The accumulator always wins a conflict, so callers pass the most
//! trusted document as the base. Nothing the overlay describes is dropped unless the
//! accumulator already has an entry under the same key.

use crate::openapi_builder::HttpMethod;
use log::{debug, warn};
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Default)]
struct MergeStats {
    paths_added: usize,
    operations_added: usize,
    operations_reconciled: usize,
}

/// Specification merger
pub struct SpecMerger;

impl SpecMerger {
    /// Merges `overlays` into a copy of `base`, one overlay at a time, in order.
    ///
    /// Inputs are not modified; the result is a new document.
    pub fn merge(base: &Value, overlays: &[Value]) -> Value {
        overlays
            .iter()
            .fold(base.clone(), |accumulator, overlay| Self::merge_pair(accumulator, overlay))
    }

    /// Merges a single overlay into an owned accumulator.
    pub fn merge_pair(accumulator: Value, overlay: &Value) -> Value {
        let mut accumulator = match accumulator {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                warn!("Merge accumulator is not a mapping ({}), starting from empty", type_name(&other));
                Map::new()
            }
        };

        let Some(overlay) = overlay.as_object() else {
            warn!("Ignoring overlay that is not a mapping ({})", type_name(overlay));
            return Value::Object(accumulator);
        };

        let mut stats = MergeStats::default();
        for (key, value) in overlay {
            match key.as_str() {
                "paths" => merge_paths(object_entry(&mut accumulator, "paths"), value, &mut stats),
                "components" => merge_components(object_entry(&mut accumulator, "components"), value),
                _ => {
                    if !accumulator.contains_key(key) {
                        accumulator.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        debug!(
            "Merged overlay: {} paths added, {} operations added, {} operations reconciled",
            stats.paths_added, stats.operations_added, stats.operations_reconciled
        );
        Value::Object(accumulator)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Mutable mapping stored under `key`, replacing a missing or non-mapping value.
fn object_entry<'a>(fields: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = fields
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        warn!("Replacing non-mapping `{}` in accumulator", key);
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just made a mapping"),
    }
}

fn merge_paths(accumulator: &mut Map<String, Value>, overlay: &Value, stats: &mut MergeStats) {
    let Some(overlay) = overlay.as_object() else {
        return;
    };

    for (path, overlay_item) in overlay {
        if !accumulator.contains_key(path) {
            accumulator.insert(path.clone(), overlay_item.clone());
            stats.paths_added += 1;
            continue;
        }

        let Some(overlay_item) = overlay_item.as_object() else {
            continue;
        };
        if !accumulator.get(path).is_some_and(Value::is_object) {
            warn!("Path item {} is not a mapping, taking the overlay's operations", path);
            accumulator.insert(path.clone(), Value::Object(overlay_item.clone()));
            stats.operations_added += overlay_item.len();
            continue;
        }
        let Some(existing) = accumulator.get_mut(path).and_then(Value::as_object_mut) else {
            continue;
        };

        for (method, overlay_operation) in overlay_item {
            if !existing.contains_key(method) {
                existing.insert(method.clone(), overlay_operation.clone());
                stats.operations_added += 1;
                continue;
            }
            // path-level fields such as `parameters` or `summary`: accumulator wins
            if method.parse::<HttpMethod>().is_err() {
                continue;
            }
            if let Some(operation) = existing.get_mut(method) {
                debug!("Reconciling {} {}", method, path);
                merge_operation(operation, overlay_operation);
                stats.operations_reconciled += 1;
            }
        }
    }
}

fn merge_operation(accumulator: &mut Value, overlay: &Value) {
    let (Some(accumulator), Some(overlay)) = (accumulator.as_object_mut(), overlay.as_object()) else {
        return;
    };

    if let Some(Value::Array(overlay_params)) = overlay.get("parameters") {
        merge_parameters(accumulator, overlay_params);
    }

    if let Some(overlay_body) = overlay.get("requestBody") {
        if !accumulator.contains_key("requestBody") {
            accumulator.insert("requestBody".to_string(), overlay_body.clone());
        } else if let (Some(Value::Object(body)), Some(Value::Object(overlay_content))) =
            (accumulator.get_mut("requestBody"), overlay_body.get("content"))
        {
            fill_missing(object_entry(body, "content"), overlay_content);
        }
    }

    if let Some(Value::Object(overlay_responses)) = overlay.get("responses") {
        fill_missing(object_entry(accumulator, "responses"), overlay_responses);
    }
}

/// Identity of a parameter: `(name, in)`, or the pointer for a `$ref` parameter.
fn parameter_key(parameter: &Value) -> Option<(String, String)> {
    if let Some(pointer) = parameter.get("$ref").and_then(Value::as_str) {
        return Some(("$ref".to_string(), pointer.to_string()));
    }
    let name = parameter.get("name")?.as_str()?;
    let location = parameter.get("in")?.as_str()?;
    Some((name.to_string(), location.to_string()))
}

fn merge_parameters(accumulator: &mut Map<String, Value>, overlay_params: &[Value]) {
    if !accumulator.contains_key("parameters") {
        if overlay_params.is_empty() {
            return;
        }
        accumulator.insert("parameters".to_string(), Value::Array(Vec::new()));
    }
    let Some(Value::Array(merged)) = accumulator.get_mut("parameters") else {
        return;
    };

    let mut seen: HashSet<(String, String)> = merged.iter().filter_map(parameter_key).collect();

    for parameter in overlay_params {
        match parameter_key(parameter) {
            Some(key) => {
                if seen.insert(key) {
                    merged.push(promote_default(parameter));
                }
            }
            None => {
                if !merged.contains(parameter) {
                    merged.push(parameter.clone());
                }
            }
        }
    }
}

/// Copies a parameter, using its schema default as the example when it has none.
fn promote_default(parameter: &Value) -> Value {
    let mut parameter = parameter.clone();
    if let Value::Object(fields) = &mut parameter {
        if !fields.contains_key("example") {
            let default = fields
                .get("schema")
                .and_then(|schema| schema.get("default"))
                .cloned();
            if let Some(default) = default {
                fields.insert("example".to_string(), default);
            }
        }
    }
    parameter
}

fn fill_missing(accumulator: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, value) in overlay {
        if !accumulator.contains_key(key) {
            accumulator.insert(key.clone(), value.clone());
        }
    }
}

fn merge_components(accumulator: &mut Map<String, Value>, overlay: &Value) {
    let Some(overlay) = overlay.as_object() else {
        return;
    };

    for (section, entries) in overlay {
        if !accumulator.contains_key(section) {
            accumulator.insert(section.clone(), entries.clone());
        } else if let (Some(Value::Object(existing)), Value::Object(entries)) =
            (accumulator.get_mut(section), entries)
        {
            fill_missing(existing, entries);
        }
    }
}
