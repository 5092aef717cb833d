//! Adapter for statically discovered route lists.
//!
//! The route discovery step emits a flat sequence of
//! `{namespace, route, methods}` records. Each record becomes one path with a minimal
//! operation per method: a summary and a fixed `200 OK` response, no schemas.

use crate::error::{Error, Result};
use crate::openapi_builder::{HttpMethod, Operation, Paths, Response};
use crate::serializer::load_document;
use log::{debug, info, warn};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// One discovered route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticRouteRecord {
    pub namespace: String,
    pub route: String,
    /// Methods in declaration order
    pub methods: Vec<HttpMethod>,
}

#[derive(Deserialize)]
struct RawRecord {
    #[serde(default)]
    namespace: String,
    #[serde(default)]
    route: String,
    #[serde(default)]
    methods: Value,
}

fn named_group_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\(\?P<(\w+)>[^)]+\)").expect("valid named group regex"))
}

const READABLE: &[HttpMethod] = &[HttpMethod::Get];
const CREATABLE: &[HttpMethod] = &[HttpMethod::Post];
const EDITABLE: &[HttpMethod] = &[HttpMethod::Put, HttpMethod::Patch];
const DELETABLE: &[HttpMethod] = &[HttpMethod::Delete];
const ALLMETHODS: &[HttpMethod] = &[
    HttpMethod::Get,
    HttpMethod::Post,
    HttpMethod::Put,
    HttpMethod::Patch,
    HttpMethod::Delete,
];

/// Method sets behind the WordPress REST server constants
fn server_constant(token: &str) -> Option<&'static [HttpMethod]> {
    let name = token.rsplit("::").next().unwrap_or(token);
    match name {
        "READABLE" => Some(READABLE),
        "CREATABLE" => Some(CREATABLE),
        "EDITABLE" => Some(EDITABLE),
        "DELETABLE" => Some(DELETABLE),
        "ALLMETHODS" => Some(ALLMETHODS),
        _ => None,
    }
}

fn parse_method_tokens(raw: &str, methods: &mut Vec<HttpMethod>) {
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if let Some(expanded) = server_constant(token) {
            methods.extend_from_slice(expanded);
            continue;
        }
        match token.parse::<HttpMethod>() {
            Ok(method) => methods.push(method),
            Err(e) => warn!("Ignoring route method {:?}: {}", token, e),
        }
    }
}

fn parse_methods(value: &Value) -> Vec<HttpMethod> {
    let mut methods = Vec::new();
    match value {
        Value::String(raw) => parse_method_tokens(raw, &mut methods),
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(raw) => parse_method_tokens(raw, &mut methods),
                    other => debug!("Ignoring non-string method entry: {}", other),
                }
            }
        }
        _ => methods.push(HttpMethod::Get),
    }
    methods
}

impl StaticRouteRecord {
    /// Full path key: namespace and route joined, duplicate separators collapsed and
    /// regex capture groups (`(?P<id>\d+)`) rewritten to `{id}` placeholders.
    pub fn full_path(&self) -> String {
        let joined = format!("/{}/{}", self.namespace, self.route);
        let templated = named_group_pattern().replace_all(&joined, "{$1}");

        let mut path = String::with_capacity(templated.len());
        for c in templated.chars() {
            if c == '/' && path.ends_with('/') {
                continue;
            }
            path.push(c);
        }
        if path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        path
    }
}

/// Parses a route list. The top level must be a sequence; records that are not
/// objects or carry no route are skipped.
pub fn parse_records(document: &Value) -> Result<Vec<StaticRouteRecord>> {
    let items = document.as_array().ok_or_else(|| {
        Error::InvalidDocument("static route list must be a sequence of records".to_string())
    })?;

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        let raw = match RawRecord::deserialize(item) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Skipping malformed route record {}: {}", item, e);
                continue;
            }
        };
        if raw.route.is_empty() {
            debug!("Skipping route record without a route");
            continue;
        }
        records.push(StaticRouteRecord {
            methods: parse_methods(&raw.methods),
            namespace: raw.namespace,
            route: raw.route,
        });
    }
    Ok(records)
}

/// Static route list adapter
pub struct StaticRouteAdapter;

impl StaticRouteAdapter {
    /// Reads a route list file (JSON or YAML).
    pub fn load(path: &Path) -> Result<Vec<StaticRouteRecord>> {
        let document = load_document(path)?;
        let records = parse_records(&document)?;
        info!("Loaded {} static route records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Converts records into `path -> method -> operation`.
    ///
    /// Repeated methods for one path overwrite each other rather than duplicating.
    pub fn adapt(records: &[StaticRouteRecord]) -> Paths {
        let mut paths = Paths::new();

        for record in records {
            let full_path = record.full_path();
            let path_item = paths.entry(full_path.clone()).or_default();

            for method in &record.methods {
                path_item.insert(method.key(), Self::minimal_operation(*method, &full_path));
            }
        }

        debug!("Adapted {} static routes into {} paths", records.len(), paths.len());
        paths
    }

    fn minimal_operation(method: HttpMethod, full_path: &str) -> Operation {
        let mut responses = BTreeMap::new();
        responses.insert(
            "200".to_string(),
            Response {
                description: "OK".to_string(),
                content: None,
            },
        );

        Operation {
            summary: Some(format!("{} {}", method, full_path)),
            parameters: None,
            request_body: None,
            responses,
            security: None,
        }
    }
}
