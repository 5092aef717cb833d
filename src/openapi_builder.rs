use crate::capture::{CaptureConfig, CaptureDocument, CaptureIngestor, CaptureRecord};
use crate::path_normalizer::PathTemplate;
use crate::schema_inference::{
    infer_body_schema, infer_response_schema, truncate_request_body, truncate_response_body,
    BodyKind, Schema,
};
use crate::security::{SecurityDetector, SecurityRegistry, SecurityRequirement, SecurityScheme};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// OpenAPI version emitted for capture-derived documents
pub const OPENAPI_VERSION: &str = "3.0.3";

/// Operations of a single path, keyed by lower-case method
pub type PathItem = BTreeMap<String, Operation>;

/// Path template -> operations
pub type Paths = BTreeMap<String, PathItem>;

/// HTTP methods an operation can be registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
    Trace,
}

impl HttpMethod {
    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Lower-case name used as the path item key
    pub fn key(&self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    /// Whether a request body is documented for this method
    pub fn accepts_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "OPTIONS" => Ok(HttpMethod::Options),
            "HEAD" => Ok(HttpMethod::Head),
            "TRACE" => Ok(HttpMethod::Trace),
            other => Err(format!("unsupported HTTP method: {}", other)),
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// API title
    pub title: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// API version
    pub version: String,
}

/// OpenAPI Server object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Where a parameter is carried in the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Cookie,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name
    pub name: String,
    /// Parameter location (path, query, header, cookie)
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    /// Whether the parameter is required
    pub required: bool,
    /// Parameter schema
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
}

impl Parameter {
    pub fn new(name: &str, location: ParameterLocation, required: bool, schema: Schema) -> Self {
        Self {
            name: name.to_string(),
            location,
            required,
            schema,
            example: None,
        }
    }
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    /// Whether the request body is required
    pub required: bool,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    /// Schema for this media type
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Response description
    pub description: String,
    /// Response content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Operation summary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Parameters (path, query, header)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<Parameter>>,
    /// Request body
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: BTreeMap<String, Response>,
    /// Security requirements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<Vec<SecurityRequirement>>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(rename = "securitySchemes", skip_serializing_if = "Option::is_none")]
    pub security_schemes: Option<BTreeMap<String, SecurityScheme>>,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    /// OpenAPI version
    pub openapi: String,
    /// API info
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    /// API paths
    pub paths: Paths,
    /// Components (security schemes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
}

impl OpenApiDocument {
    /// Converts the document into a generic JSON tree for merging
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    pub fn operation_count(&self) -> usize {
        self.paths.values().map(|item| item.len()).sum()
    }
}

/// Request side of an observed exchange.
#[derive(Debug, Clone, Default)]
pub struct RequestEntry {
    pub request_body: Option<RequestBody>,
}

impl RequestEntry {
    pub fn with_body(mut self, media_type: &str, schema: Schema) -> Self {
        let mut content = BTreeMap::new();
        content.insert(media_type.to_string(), MediaType { schema });
        self.request_body = Some(RequestBody {
            required: true,
            content,
        });
        self
    }
}

/// Response side of an observed exchange.
#[derive(Debug, Clone)]
pub struct ResponseEntry {
    pub status: i64,
    pub mime_type: String,
    pub schema: Option<Schema>,
}

/// Assembles one operation per observed (path, method).
pub struct OperationBuilder;

impl OperationBuilder {
    pub fn build(
        method: HttpMethod,
        template: &PathTemplate,
        request: RequestEntry,
        response: ResponseEntry,
        security: Option<Vec<SecurityRequirement>>,
    ) -> Operation {
        let mut content = BTreeMap::new();
        content.insert(
            response.mime_type,
            MediaType {
                schema: response.schema.unwrap_or_else(|| Schema::of_type("object")),
            },
        );

        let mut responses = BTreeMap::new();
        responses.insert(
            response.status.to_string(),
            Response {
                description: format!("Response for {}", method),
                content: Some(content),
            },
        );

        let parameters = Some(template.parameters()).filter(|params| !params.is_empty());

        let request_body = if method.accepts_body() {
            request.request_body
        } else {
            None
        };

        Operation {
            summary: Some(format!("{} operation", method)),
            parameters,
            request_body,
            responses,
            security,
        }
    }
}

/// Outcome of one ingestion pass over a capture.
#[derive(Debug, Clone)]
pub struct CaptureSpec {
    pub document: OpenApiDocument,
    /// In-scope records examined
    pub records: usize,
}

/// Capture-derived OpenAPI document builder
pub struct OpenApiBuilder {
    /// OpenAPI info section
    info: Info,
    config: CaptureConfig,
    /// Origin-qualified server URL, taken from the first in-scope record
    server: Option<String>,
    /// Paths collection (path template -> method -> Operation)
    paths: Paths,
    security: SecurityRegistry,
    records: usize,
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new(config: CaptureConfig) -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            info: Info {
                title: "WordPress REST API".to_string(),
                description: Some("Auto-generated API specification from HAR capture".to_string()),
                version: "1.0.0".to_string(),
            },
            config,
            server: None,
            paths: Paths::new(),
            security: SecurityRegistry::new(),
            records: 0,
        }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.info = Info {
            title,
            description,
            version,
        };
        self
    }

    /// Runs a full ingestion pass over a capture document.
    pub fn from_capture(document: &CaptureDocument, config: CaptureConfig) -> CaptureSpec {
        let records = CaptureIngestor::new(config.clone()).ingest(document);
        let mut builder = Self::new(config);
        for record in &records {
            builder.add_record(record);
        }
        builder.build()
    }

    /// Folds one captured exchange into the document.
    ///
    /// A later record for the same (path template, method) replaces the earlier operation.
    pub fn add_record(&mut self, record: &CaptureRecord) {
        self.records += 1;

        if self.server.is_none() {
            self.server = Some(format!("{}{}", record.origin, self.config.api_prefix));
        }

        let template = PathTemplate::normalize(&record.path);
        if let Some(kind) = SecurityDetector::detect(record.header_pairs()) {
            self.security.register(kind, template.as_str(), &record.method);
        }

        let method = match record.method.parse::<HttpMethod>() {
            Ok(method) => method,
            Err(e) => {
                warn!("Skipping {} {}: {}", record.method, record.path, e);
                return;
            }
        };

        let mut request = RequestEntry::default();
        if let Some(body) = &record.request_body {
            let stored =
                truncate_request_body(&body.text, body.content_type.as_deref(), self.config.max_body_length);
            debug!("{} {} request body ({} chars stored)", method, template, stored.chars().count());

            if method.accepts_body() {
                let inferred = body.content_type.as_deref().and_then(|ct| {
                    let kind = BodyKind::classify(ct)?;
                    infer_body_schema(&body.text, ct).map(|schema| (kind, schema))
                });
                if let Some((kind, schema)) = inferred {
                    request = request.with_body(kind.media_type(), schema);
                }
            }
        }

        let Some(body) = &record.response_body else {
            debug!("No response body for {} {}, skipping operation", method, template);
            return;
        };

        let stored = truncate_response_body(&body.text, self.config.max_body_length);
        let response = ResponseEntry {
            status: record.status,
            mime_type: body
                .content_type
                .clone()
                .filter(|mime| !mime.is_empty())
                .unwrap_or_else(|| "application/json".to_string()),
            schema: infer_response_schema(&stored, body.content_type.as_deref()),
        };

        let security = self.security.requirement_for(template.as_str(), method.as_str());
        let operation = OperationBuilder::build(method, &template, request, response, security);

        let path_item = self.paths.entry(template.to_string()).or_default();
        if path_item.insert(method.key(), operation).is_some() {
            debug!("Replacing earlier observation of {} {}", method, template);
        }
    }

    /// Build the final OpenAPI document
    pub fn build(self) -> CaptureSpec {
        debug!("Building capture-derived OpenAPI document");

        let components = if self.security.is_empty() {
            None
        } else {
            Some(Components {
                security_schemes: Some(self.security.schemes()),
            })
        };

        let document = OpenApiDocument {
            openapi: OPENAPI_VERSION.to_string(),
            info: self.info,
            servers: vec![Server {
                url: self.server.unwrap_or_else(|| self.config.api_prefix.clone()),
                description: Some("Development server".to_string()),
            }],
            paths: self.paths,
            components,
        };

        info!(
            "Extracted {} endpoints ({} operations) from {} records",
            document.paths.len(),
            document.operation_count(),
            self.records
        );
        if !self.security.is_empty() {
            info!("Security schemes detected: {:?}", self.security.scheme_keys());
        }

        CaptureSpec {
            document,
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::Body;
    use pretty_assertions::assert_eq;

    fn record(method: &str, path: &str, status: i64, response: Option<(&str, &str)>) -> CaptureRecord {
        CaptureRecord {
            method: method.to_string(),
            url: format!("http://localhost/wp-json{}", path),
            origin: "http://localhost".to_string(),
            path: path.to_string(),
            headers: Vec::new(),
            request_body: None,
            status,
            response_body: response.map(|(text, mime)| Body {
                text: text.to_string(),
                content_type: Some(mime.to_string()),
            }),
        }
    }

    #[test]
    fn test_http_method_parsing() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" PATCH ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("PROPFIND".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Delete.key(), "delete");
        assert!(HttpMethod::Put.accepts_body());
        assert!(!HttpMethod::Get.accepts_body());
    }

    #[test]
    fn test_operation_builder_minimal() {
        let operation = OperationBuilder::build(
            HttpMethod::Get,
            &PathTemplate::normalize("/wp/v2/types"),
            RequestEntry::default(),
            ResponseEntry {
                status: 200,
                mime_type: "application/json".to_string(),
                schema: None,
            },
            None,
        );

        assert_eq!(operation.summary.as_deref(), Some("GET operation"));
        assert!(operation.parameters.is_none());
        assert!(operation.request_body.is_none());
        assert!(operation.security.is_none());
        assert_eq!(operation.responses.len(), 1);

        let response = &operation.responses["200"];
        assert_eq!(response.description, "Response for GET");
        let content = response.content.as_ref().unwrap();
        assert_eq!(content["application/json"].schema, Schema::of_type("object"));
    }

    #[test]
    fn test_operation_builder_drops_body_for_get() {
        let request = RequestEntry::default().with_body("application/json", Schema::of_type("object"));
        let response = ResponseEntry {
            status: 200,
            mime_type: "application/json".to_string(),
            schema: None,
        };

        let template = PathTemplate::normalize("/wp/v2/posts");

        let get = OperationBuilder::build(HttpMethod::Get, &template, request.clone(), response.clone(), None);
        assert!(get.request_body.is_none());

        let post = OperationBuilder::build(HttpMethod::Post, &template, request, response, None);
        assert!(post.request_body.as_ref().unwrap().required);
    }

    #[test]
    fn test_operation_builder_attaches_template_parameters() {
        let template = PathTemplate::normalize("/wp/v2/posts/7");
        let operation = OperationBuilder::build(
            HttpMethod::Delete,
            &template,
            RequestEntry::default(),
            ResponseEntry {
                status: 410,
                mime_type: "application/json".to_string(),
                schema: None,
            },
            None,
        );
        let parameters = operation.parameters.unwrap();
        assert_eq!(parameters.len(), 1);
        assert_eq!(parameters[0].name, "id");
        assert!(operation.responses.contains_key("410"));
    }

    #[test]
    fn test_builder_last_observation_wins() {
        let mut builder = OpenApiBuilder::new(CaptureConfig::default());
        builder.add_record(&record("GET", "/wp/v2/posts/1", 200, Some(("{\"a\":1}", "application/json"))));
        builder.add_record(&record("GET", "/wp/v2/posts/2", 404, Some(("{}", "application/json"))));

        let spec = builder.build();
        let operations = &spec.document.paths["/wp/v2/posts/{id}"];
        assert_eq!(operations.len(), 1);
        let responses = &operations["get"].responses;
        assert_eq!(responses.keys().collect::<Vec<_>>(), vec!["404"]);
        assert_eq!(spec.records, 2);
    }

    #[test]
    fn test_builder_skips_records_without_response_body() {
        let mut builder = OpenApiBuilder::new(CaptureConfig::default());
        builder.add_record(&record("GET", "/wp/v2/settings", 200, None));
        let spec = builder.build();
        assert!(spec.document.paths.is_empty());
        assert_eq!(spec.document.servers[0].url, "http://localhost/wp-json");
    }

    #[test]
    fn test_builder_request_body_for_post() {
        let mut post = record("POST", "/wp/v2/posts", 201, Some(("{\"id\":5}", "application/json")));
        post.request_body = Some(Body {
            text: "title=Hello&status=draft".to_string(),
            content_type: Some("application/x-www-form-urlencoded; charset=UTF-8".to_string()),
        });

        let mut builder = OpenApiBuilder::new(CaptureConfig::default());
        builder.add_record(&post);
        let spec = builder.build();

        let operation = &spec.document.paths["/wp/v2/posts"]["post"];
        let body = operation.request_body.as_ref().unwrap();
        let schema = &body.content["application/x-www-form-urlencoded"].schema;
        assert_eq!(schema.properties.as_ref().unwrap().len(), 2);

        let response_schema = &operation.responses["201"].content.as_ref().unwrap()["application/json"].schema;
        assert_eq!(
            response_schema.properties.as_ref().unwrap()["id"].schema_type.as_deref(),
            Some("integer")
        );
    }

    #[test]
    fn test_builder_security_requirement_persists_for_endpoint() {
        let mut authed = record("GET", "/wp/v2/users/me", 200, Some(("{}", "application/json")));
        authed.headers.push(("Authorization".to_string(), "Basic abc".to_string()));
        let anonymous = record("GET", "/wp/v2/users/me", 200, Some(("{}", "application/json")));

        let mut builder = OpenApiBuilder::new(CaptureConfig::default());
        builder.add_record(&authed);
        builder.add_record(&anonymous);
        let spec = builder.build();

        let operation = &spec.document.paths["/wp/v2/users/me"]["get"];
        let security = operation.security.as_ref().unwrap();
        assert!(security[0].contains_key("basic_auth"));

        let schemes = spec.document.components.unwrap().security_schemes.unwrap();
        assert_eq!(schemes.keys().collect::<Vec<_>>(), vec!["basic_auth"]);
    }

    #[test]
    fn test_unsupported_method_still_registers_scheme() {
        let mut unknown = record("FETCH", "/wp/v2/media", 200, Some(("{}", "application/json")));
        unknown.headers.push(("Authorization".to_string(), "Basic abc".to_string()));
        let mut bearer = record("GET", "/wp/v2/posts", 200, Some(("{}", "application/json")));
        bearer.headers.push(("Authorization".to_string(), "Bearer xyz".to_string()));

        let mut builder = OpenApiBuilder::new(CaptureConfig::default());
        builder.add_record(&unknown);
        builder.add_record(&bearer);
        let spec = builder.build();

        assert!(!spec.document.paths.contains_key("/wp/v2/media"));
        let schemes = spec.document.components.unwrap().security_schemes.unwrap();
        assert_eq!(schemes.keys().collect::<Vec<_>>(), vec!["basic_auth", "bearer_auth"]);

        let security = spec.document.paths["/wp/v2/posts"]["get"].security.as_ref().unwrap();
        assert!(security[0].contains_key("basic_auth"));
    }

    #[test]
    fn test_build_without_records_uses_default_server() {
        let spec = OpenApiBuilder::new(CaptureConfig::default()).build();
        assert_eq!(spec.document.openapi, "3.0.3");
        assert_eq!(spec.document.servers[0].url, "/wp-json");
        assert!(spec.document.components.is_none());
    }

    #[test]
    fn test_with_info() {
        let spec = OpenApiBuilder::new(CaptureConfig::default())
            .with_info("Shop API".to_string(), "2.0.0".to_string(), None)
            .build();
        assert_eq!(spec.document.info.title, "Shop API");
        assert_eq!(spec.document.info.version, "2.0.0");
        assert!(spec.document.info.description.is_none());
    }
}
