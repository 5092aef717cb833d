//! Serialization module for reading and writing specification documents.
//!
//! Every produced document is written twice: a structured JSON file and a flat,
//! human-readable YAML file. Both parse back to the same logical tree.

use crate::error::{Error, Result as DocumentResult};
use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Number, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Serializes a document to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize document to YAML")
}

/// Serializes a document to JSON format with pretty printing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json<T: Serialize>(doc: &T) -> Result<String> {
    debug!("Serializing document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize document to JSON")
}

/// Writes string content to a file.
///
/// Creates the file if it doesn't exist, or overwrites it if it does. Missing parent
/// directories are created.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

/// Writes `doc` as `<stem>.json` and `<stem>.yaml` next to `output`.
///
/// # Returns
///
/// The JSON and YAML paths, in that order.
pub fn write_document<T: Serialize>(doc: &T, output: &Path) -> Result<(PathBuf, PathBuf)> {
    let json_path = output.with_extension("json");
    let yaml_path = output.with_extension("yaml");

    write_to_file(&serialize_json(doc)?, &json_path)?;
    write_to_file(&serialize_yaml(doc)?, &yaml_path)?;

    Ok((json_path, yaml_path))
}

/// Loads a JSON or YAML document, chosen by file extension.
///
/// # Errors
///
/// Returns an error if the file cannot be read, has an unsupported extension, or does not
/// parse.
pub fn load_document(path: &Path) -> DocumentResult<Value> {
    debug!("Loading document: {}", path.display());

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let content = match extension.as_deref() {
        Some("json") | Some("yaml") | Some("yml") | Some("har") => fs::read_to_string(path)?,
        _ => {
            return Err(Error::InvalidArgument(format!(
                "Unsupported file type: {}",
                path.display()
            )))
        }
    };

    match extension.as_deref() {
        Some("yaml") | Some("yml") => parse_yaml(&content).map_err(|e| match e {
            Error::SerializationError(message) => Error::parse(path, message),
            other => other,
        }),
        _ => serde_json::from_str(&content).map_err(|e| Error::parse(path, e)),
    }
}

/// Parses YAML into a JSON tree. Non-string mapping keys (such as bare `200:` response
/// codes) become strings.
pub fn parse_yaml(content: &str) -> DocumentResult<Value> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    yaml_to_json(yaml)
}

fn yaml_to_json(value: serde_yaml::Value) -> DocumentResult<Value> {
    use serde_yaml::Value as Yaml;

    Ok(match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<DocumentResult<Vec<_>>>()?,
        ),
        Yaml::Mapping(mapping) => {
            let mut fields = Map::new();
            for (key, value) in mapping {
                fields.insert(yaml_key(key)?, yaml_to_json(value)?);
            }
            Value::Object(fields)
        }
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

fn yaml_key(key: serde_yaml::Value) -> DocumentResult<String> {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => Ok(s),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        Yaml::Null => Ok("null".to_string()),
        other => Err(Error::InvalidDocument(format!(
            "unsupported mapping key: {:?}",
            other
        ))),
    }
}
