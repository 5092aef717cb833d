//! Traffic capture ingestion.
//!
//! Reads a HAR-shaped capture document and turns every in-scope entry into a
//! [`CaptureRecord`]. A capture that cannot be parsed at all is fatal; individual entries
//! with unusable URLs are skipped with a warning.

use crate::error::{Error, Result};
use crate::schema_inference::MAX_BODY_LENGTH;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::Path;
use url::Url;

/// Options controlling which traffic is in scope and how bodies are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureConfig {
    /// URL path prefix under which the REST API is served
    pub api_prefix: String,
    /// Character budget for stored request/response bodies
    pub max_body_length: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            api_prefix: "/wp-json".to_string(),
            max_body_length: MAX_BODY_LENGTH,
        }
    }
}

impl CaptureConfig {
    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let trimmed = prefix.trim_end_matches('/');
        self.api_prefix = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };
        self
    }

    pub fn with_max_body_length(mut self, max: usize) -> Self {
        self.max_body_length = max;
        self
    }
}

/// A parsed capture file.
#[derive(Debug, Clone, Default)]
pub struct CaptureDocument {
    pub entries: Vec<HarEntry>,
}

/// One request/response pair in the capture
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarEntry {
    #[serde(deserialize_with = "lenient")]
    pub request: HarRequest,
    #[serde(deserialize_with = "lenient")]
    pub response: HarResponse,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HarRequest {
    #[serde(deserialize_with = "lenient")]
    pub method: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub url: String,
    #[serde(deserialize_with = "lenient")]
    pub headers: Vec<HarHeader>,
    #[serde(deserialize_with = "lenient")]
    pub post_data: Option<HarBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarResponse {
    #[serde(deserialize_with = "status_code")]
    pub status: i64,
    #[serde(deserialize_with = "lenient")]
    pub content: Option<HarBody>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HarHeader {
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    #[serde(deserialize_with = "lenient")]
    pub value: String,
}

/// Body text plus its declared mime type (`postData` and `response.content`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HarBody {
    #[serde(deserialize_with = "lenient")]
    pub text: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub mime_type: Option<String>,
}

/// Reads a field, falling back to its default when the value has the wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Status codes recorded as numbers or numeric strings; anything else is 0.
fn status_code<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().unwrap_or_default(),
        Value::String(s) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

fn shape(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

impl CaptureDocument {
    /// Parses capture content. Accepts a HAR envelope (`{"log": {"entries": [...]}}`)
    /// or a bare sequence of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the content is not JSON or has neither shape. Individual
    /// entries that are not mappings are skipped with a warning.
    pub fn parse(content: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(content)?;
        Self::from_value(value)
    }

    /// Builds a capture from an already parsed JSON tree.
    pub fn from_value(value: Value) -> Result<Self> {
        let raw_entries = match value {
            Value::Array(items) => items,
            Value::Object(mut fields) => match fields.remove("log") {
                Some(Value::Object(mut log)) => match log.remove("entries") {
                    Some(Value::Array(items)) => items,
                    None | Some(Value::Null) => Vec::new(),
                    Some(other) => {
                        return Err(Error::InvalidDocument(format!(
                            "capture `log.entries` must be a sequence, found {}",
                            shape(&other)
                        )))
                    }
                },
                Some(other) => {
                    return Err(Error::InvalidDocument(format!(
                        "capture `log` must be a mapping, found {}",
                        shape(&other)
                    )))
                }
                None => {
                    return Err(Error::InvalidDocument(
                        "capture document has no `log` section".to_string(),
                    ))
                }
            },
            other => {
                return Err(Error::InvalidDocument(format!(
                    "capture document must be a HAR mapping or a sequence of entries, found {}",
                    shape(&other)
                )))
            }
        };

        let mut entries = Vec::with_capacity(raw_entries.len());
        for (index, raw) in raw_entries.iter().enumerate() {
            match HarEntry::deserialize(raw) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping malformed capture entry #{}: {}", index, e),
            }
        }
        Ok(Self { entries })
    }

    /// Reads and parses a capture file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid capture document.
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading capture file: {}", path.display());
        let content = fs::read_to_string(path)?;
        let document = Self::parse(&content).map_err(|e| match e {
            Error::SerializationError(message) => Error::parse(path, message),
            other => other,
        })?;
        info!("Loaded {} capture entries from {}", document.entries.len(), path.display());
        Ok(document)
    }
}

/// Captured body with its declared content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub text: String,
    pub content_type: Option<String>,
}

impl Body {
    fn from_har(body: &HarBody) -> Option<Self> {
        body.text.as_ref().filter(|text| !text.is_empty()).map(|text| Body {
            text: text.clone(),
            content_type: body.mime_type.clone(),
        })
    }
}

/// One in-scope request/response pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    /// Upper-cased HTTP method
    pub method: String,
    /// Full request URL as captured
    pub url: String,
    /// `scheme://host[:port]` of the request
    pub origin: String,
    /// Request path relative to the API prefix, always starting with `/`
    pub path: String,
    /// Request headers in capture order, duplicates retained
    pub headers: Vec<(String, String)>,
    pub request_body: Option<Body>,
    pub status: i64,
    pub response_body: Option<Body>,
}

impl CaptureRecord {
    pub fn header_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter().map(|(name, value)| (name.as_str(), value.as_str()))
    }
}

/// Filters a capture down to API traffic.
pub struct CaptureIngestor {
    config: CaptureConfig,
}

impl CaptureIngestor {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Yields one record per in-scope entry, in capture order.
    pub fn ingest(&self, document: &CaptureDocument) -> Vec<CaptureRecord> {
        let records: Vec<CaptureRecord> = document
            .entries
            .iter()
            .filter_map(|entry| self.record_from_entry(entry))
            .collect();
        debug!(
            "{} of {} capture entries are API traffic",
            records.len(),
            document.entries.len()
        );
        records
    }

    fn record_from_entry(&self, entry: &HarEntry) -> Option<CaptureRecord> {
        let raw_url = &entry.request.url;
        let marker = format!("{}/", self.config.api_prefix);
        if !raw_url.contains(&marker) {
            return None;
        }

        let parsed = match Url::parse(raw_url) {
            Ok(url) => url,
            Err(e) => {
                warn!("Skipping capture entry with unparsable URL {}: {}", raw_url, e);
                return None;
            }
        };

        let path = parsed.path().replacen(&self.config.api_prefix, "", 1);
        let path = if path.starts_with('/') { path } else { format!("/{}", path) };

        let method = entry
            .request
            .method
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or("GET")
            .to_ascii_uppercase();

        Some(CaptureRecord {
            method,
            url: raw_url.clone(),
            origin: parsed.origin().ascii_serialization(),
            path,
            headers: entry
                .request
                .headers
                .iter()
                .map(|h| (h.name.clone(), h.value.clone()))
                .collect(),
            request_body: entry.request.post_data.as_ref().and_then(Body::from_har),
            status: entry.response.status,
            response_body: entry.response.content.as_ref().and_then(Body::from_har),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HAR: &str = r#"{
        "log": {
            "entries": [
                {
                    "request": {
                        "method": "get",
                        "url": "http://localhost:8080/wp-json/wp/v2/posts/42?context=edit",
                        "headers": [{"name": "Authorization", "value": "Bearer xyz"}]
                    },
                    "response": {
                        "status": 200,
                        "content": {"text": "[]", "mimeType": "application/json"}
                    }
                },
                {
                    "request": {"method": "GET", "url": "http://localhost:8080/wp-admin/index.php"},
                    "response": {"status": 200}
                },
                {
                    "request": {
                        "method": "POST",
                        "url": "http://localhost:8080/wp-json/wp/v2/posts",
                        "postData": {"text": "{\"title\":\"x\"}", "mimeType": "application/json"}
                    },
                    "response": {"status": 201, "content": {"text": "", "mimeType": "application/json"}}
                }
            ]
        }
    }"#;

    #[test]
    fn test_parse_envelope() {
        let document = CaptureDocument::parse(HAR).unwrap();
        assert_eq!(document.entries.len(), 3);
    }

    #[test]
    fn test_parse_bare_entries() {
        let document = CaptureDocument::parse(
            r#"[{"request": {"url": "http://h/wp-json/a"}, "response": {"status": 204}}]"#,
        )
        .unwrap();
        assert_eq!(document.entries.len(), 1);
        assert_eq!(document.entries[0].response.status, 204);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            CaptureDocument::parse("{ not json"),
            Err(Error::SerializationError(_))
        ));
        assert!(matches!(CaptureDocument::parse("42"), Err(Error::InvalidDocument(_))));
        assert!(matches!(
            CaptureDocument::parse(r#"{"entries": []}"#),
            Err(Error::InvalidDocument(_))
        ));
        assert!(matches!(
            CaptureDocument::parse(r#"{"log": {"entries": {}}}"#),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_bad_entry_does_not_drop_its_neighbours() {
        let document = CaptureDocument::parse(
            r#"{"log": {"entries": [
                {
                    "request": {"method": "GET", "url": "http://h/wp-json/wp/v2/posts/1", "headers": []},
                    "response": {"status": 200, "content": {"text": "{}", "mimeType": "application/json"}}
                },
                {
                    "request": {
                        "method": "GET",
                        "url": "http://h/wp-json/wp/v2/pages/2",
                        "headers": [{"name": "X-Empty", "value": null}]
                    },
                    "response": {"status": "404", "content": {"text": null}}
                },
                {"request": {"url": null}, "response": {"status": true}},
                "not an entry"
            ]}}"#,
        )
        .unwrap();
        assert_eq!(document.entries.len(), 3);
        assert_eq!(document.entries[1].request.headers[0].name, "X-Empty");
        assert_eq!(document.entries[1].request.headers[0].value, "");
        assert_eq!(document.entries[1].response.status, 404);
        assert_eq!(document.entries[2].response.status, 0);

        let records = CaptureIngestor::new(CaptureConfig::default()).ingest(&document);
        let paths: Vec<&str> = records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/wp/v2/posts/1", "/wp/v2/pages/2"]);
        assert!(records[1].response_body.is_none());
    }

    #[test]
    fn test_ingest_filters_and_strips_prefix() {
        let document = CaptureDocument::parse(HAR).unwrap();
        let records = CaptureIngestor::new(CaptureConfig::default()).ingest(&document);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].method, "GET");
        assert_eq!(records[0].path, "/wp/v2/posts/42");
        assert_eq!(records[0].origin, "http://localhost:8080");
        assert_eq!(records[0].header_pairs().next(), Some(("Authorization", "Bearer xyz")));
        assert_eq!(records[0].response_body.as_ref().unwrap().text, "[]");

        assert_eq!(records[1].method, "POST");
        assert_eq!(records[1].path, "/wp/v2/posts");
        assert!(records[1].request_body.is_some());
        assert!(records[1].response_body.is_none());
    }

    #[test]
    fn test_custom_api_prefix() {
        let config = CaptureConfig::default().with_api_prefix("api/");
        assert_eq!(config.api_prefix, "/api");

        let document = CaptureDocument::parse(
            r#"[{"request": {"url": "https://example.com/api/v1/items/7"}, "response": {}}]"#,
        )
        .unwrap();
        let records = CaptureIngestor::new(config).ingest(&document);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].path, "/v1/items/7");
        assert_eq!(records[0].method, "GET");
    }

    #[test]
    fn test_from_file_reports_path_on_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{{{").unwrap();

        let err = CaptureDocument::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::ParseError { .. }));
    }
}
