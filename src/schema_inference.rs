//! Schema inference from sampled request and response payloads.
//!
//! Captured bodies arrive as raw text with a declared content type. This module parses
//! them (multipart, form-urlencoded or JSON) and derives a JSON-schema-shaped
//! description. Parsing failures never propagate: an unparsable body simply yields no
//! schema.

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Default character budget for stored bodies
pub const MAX_BODY_LENGTH: usize = 2000;

/// Appended to a body cut down to the character budget
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format for primitive types (e.g. "uuid")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Sampled value observed in the capture
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl Schema {
    pub fn of_type(schema_type: &str) -> Self {
        Self {
            schema_type: Some(schema_type.to_string()),
            ..Self::default()
        }
    }

    pub fn object(properties: BTreeMap<String, Schema>) -> Self {
        Self {
            schema_type: Some("object".to_string()),
            properties: Some(properties),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    pub fn with_example(mut self, example: Value) -> Self {
        self.example = Some(example);
        self
    }

    /// Builds a request-body schema from a parsed sample.
    ///
    /// A mapping yields one string property per field carrying the sampled value as its
    /// example. Any other sample becomes an untyped object example.
    pub fn from_sample(sample: &Value) -> Self {
        match sample {
            Value::Object(fields) => Schema::object(
                fields
                    .iter()
                    .map(|(name, value)| {
                        (name.clone(), Schema::of_type("string").with_example(value.clone()))
                    })
                    .collect(),
            ),
            other => Schema::of_type("object").with_example(other.clone()),
        }
    }
}

/// The body encodings the inferencer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Multipart,
    FormUrlEncoded,
    Json,
}

impl BodyKind {
    /// Classifies a declared content type, ignoring parameters such as `boundary`.
    pub fn classify(content_type: &str) -> Option<Self> {
        let lowered = content_type.to_ascii_lowercase();
        if lowered.contains("multipart/form-data") {
            Some(BodyKind::Multipart)
        } else if lowered.contains("application/x-www-form-urlencoded") {
            Some(BodyKind::FormUrlEncoded)
        } else if lowered.contains("json") {
            Some(BodyKind::Json)
        } else {
            None
        }
    }

    /// Canonical media type used as the requestBody content key
    pub fn media_type(&self) -> &'static str {
        match self {
            BodyKind::Multipart => "multipart/form-data",
            BodyKind::FormUrlEncoded => "application/x-www-form-urlencoded",
            BodyKind::Json => "application/json",
        }
    }
}

/// Infers a request-body schema from a raw body and its declared content type.
pub fn infer_body_schema(raw_body: &str, content_type: &str) -> Option<Schema> {
    let sample = match BodyKind::classify(content_type)? {
        BodyKind::Multipart => parse_multipart(raw_body, content_type).map(Value::Object),
        BodyKind::FormUrlEncoded => parse_form_urlencoded(raw_body).map(Value::Object),
        BodyKind::Json => parse_json(raw_body),
    }?;

    if !is_meaningful(&sample) {
        debug!("Request body parsed to an empty sample, no schema inferred");
        return None;
    }

    Some(Schema::from_sample(&sample))
}

/// Infers a response schema from the top-level keys of a JSON object body.
///
/// Only attempted when the content type mentions JSON. Nested values are typed by their
/// outer shape only.
pub fn infer_response_schema(raw_body: &str, content_type: Option<&str>) -> Option<Schema> {
    let content_type = content_type?;
    if raw_body.is_empty() || !content_type.to_ascii_lowercase().contains("json") {
        return None;
    }

    let parsed: Value = serde_json::from_str(raw_body).ok()?;
    let fields = parsed.as_object()?;

    let properties = fields
        .iter()
        .map(|(name, value)| (name.clone(), Schema::of_type(runtime_type(value))))
        .collect();

    Some(Schema::object(properties))
}

fn runtime_type(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
        _ => "string",
    }
}

fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

fn boundary_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"boundary=([^\s;]+)").expect("valid boundary regex"))
}

fn field_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"name="([^"]+)""#).expect("valid field name regex"))
}

fn field_value_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\r\n\r\n(.*?)\r\n").expect("valid field value regex"))
}

/// Splits a multipart body on its boundary and collects `name -> value` text fields.
///
/// Parts without a field name, or without a value terminated by a line break, are skipped.
pub fn parse_multipart(body: &str, content_type: &str) -> Option<Map<String, Value>> {
    if body.is_empty() {
        return None;
    }

    let boundary = boundary_pattern().captures(content_type)?.get(1)?.as_str();
    let delimiter = format!("--{}", boundary);

    let mut fields = Map::new();
    for part in body.split(delimiter.as_str()) {
        let trimmed = part.trim();
        if trimmed.is_empty() || trimmed == "--" {
            continue;
        }

        let Some(name) = field_name_pattern().captures(part).and_then(|c| c.get(1)) else {
            continue;
        };
        if let Some(value) = field_value_pattern().captures(part).and_then(|c| c.get(1)) {
            fields.insert(
                name.as_str().to_string(),
                Value::String(value.as_str().trim().to_string()),
            );
        }
    }

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

/// Decodes an `application/x-www-form-urlencoded` body.
///
/// Blank values are dropped. A field seen once maps to a string, a repeated field to a
/// sequence of strings.
pub fn parse_form_urlencoded(body: &str) -> Option<Map<String, Value>> {
    if body.is_empty() {
        return None;
    }

    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
        if value.is_empty() {
            continue;
        }
        match grouped.iter_mut().find(|(existing, _)| existing.as_str() == key) {
            Some((_, values)) => values.push(value.into_owned()),
            None => grouped.push((key.into_owned(), vec![value.into_owned()])),
        }
    }

    let fields: Map<String, Value> = grouped
        .into_iter()
        .map(|(key, mut values)| {
            let value = if values.len() == 1 {
                Value::String(values.remove(0))
            } else {
                Value::Array(values.into_iter().map(Value::String).collect())
            };
            (key, value)
        })
        .collect();

    if fields.is_empty() {
        None
    } else {
        Some(fields)
    }
}

/// Parses a JSON body, returning `None` on any parse failure.
pub fn parse_json(body: &str) -> Option<Value> {
    if body.is_empty() {
        return None;
    }
    match serde_json::from_str(body) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Ignoring unparsable JSON body: {}", e);
            None
        }
    }
}

/// Shortens a request body for storage. Multipart bodies are kept intact.
pub fn truncate_request_body<'a>(body: &'a str, content_type: Option<&str>, max: usize) -> Cow<'a, str> {
    let multipart = body.contains("multipart")
        || content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("multipart"));
    if multipart {
        return Cow::Borrowed(body);
    }
    truncate(body, max)
}

/// Shortens a response body for storage.
///
/// A large body that looks like a REST discovery index (namespaces plus routes) is
/// replaced by a small JSON placeholder recording its original length, so the stored
/// copy remains valid JSON.
pub fn truncate_response_body(body: &str, max: usize) -> Cow<'_, str> {
    let length = body.chars().count();
    if length <= max {
        return Cow::Borrowed(body);
    }

    if body.contains("\"namespace\":\"") && body.contains("\"routes\":") {
        debug!("Replacing {} character discovery index with placeholder", length);
        return Cow::Owned(format!(
            "{{\"truncated\": true, \"message\": \"WordPress REST API schema truncated for brevity\", \"original_length\": {}}}",
            length
        ));
    }

    truncate(body, max)
}

fn truncate(body: &str, max: usize) -> Cow<'_, str> {
    match body.char_indices().nth(max) {
        Some((cut, _)) => Cow::Owned(format!("{}{}", &body[..cut], TRUNCATION_MARKER)),
        None => Cow::Borrowed(body),
    }
}
