//! Security scheme detection from captured request headers.

use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A security requirement: scheme key -> required scopes
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// Header carrying credentials in captured requests
pub const AUTHORIZATION_HEADER: &str = "authorization";

/// Header used by the registered API key scheme
pub const API_KEY_HEADER: &str = "X-API-Key";

/// OpenAPI SecurityScheme object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SecurityScheme {
    /// HTTP authentication (`basic` or `bearer`)
    #[serde(rename = "http")]
    Http { scheme: String },
    /// API key sent in a named header
    #[serde(rename = "apiKey")]
    ApiKey {
        name: String,
        #[serde(rename = "in")]
        location: String,
    },
}

/// Authentication styles recognised in an `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthKind {
    Basic,
    Bearer,
    ApiKey,
}

impl AuthKind {
    /// Key under which the scheme is registered in `components.securitySchemes`
    pub fn key(&self) -> &'static str {
        match self {
            AuthKind::Basic => "basic_auth",
            AuthKind::Bearer => "bearer_auth",
            AuthKind::ApiKey => "api_key",
        }
    }

    pub fn scheme(&self) -> SecurityScheme {
        match self {
            AuthKind::Basic => SecurityScheme::Http {
                scheme: "basic".to_string(),
            },
            AuthKind::Bearer => SecurityScheme::Http {
                scheme: "bearer".to_string(),
            },
            AuthKind::ApiKey => SecurityScheme::ApiKey {
                name: API_KEY_HEADER.to_string(),
                location: "header".to_string(),
            },
        }
    }
}

/// Security scheme detector for captured requests.
pub struct SecurityDetector;

impl SecurityDetector {
    /// Classifies the `Authorization` header among `headers` (name lookup is
    /// case-insensitive, first match wins).
    ///
    /// Returns `None` when the header is missing or its value is not recognised.
    pub fn detect<'a, I>(headers: I) -> Option<AuthKind>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let value = headers
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(AUTHORIZATION_HEADER))
            .map(|(_, value)| value)?;

        if value.starts_with("Basic ") {
            Some(AuthKind::Basic)
        } else if value.starts_with("Bearer ") {
            Some(AuthKind::Bearer)
        } else if value.contains("API-Key") {
            // also covers "X-API-Key"
            Some(AuthKind::ApiKey)
        } else {
            debug!("Unrecognised authorization scheme, ignoring");
            None
        }
    }
}

/// Security state accumulated over one ingestion pass.
///
/// Schemes are kept in first-detection order and a key is only registered once. The set
/// of protected endpoints covers every (path, method) pair seen with any credentials.
#[derive(Debug, Clone, Default)]
pub struct SecurityRegistry {
    schemes: Vec<(String, SecurityScheme)>,
    protected: HashSet<(String, String)>,
}

impl SecurityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a detection for an endpoint. The first scheme seen under a key is kept.
    pub fn register(&mut self, kind: AuthKind, path: &str, method: &str) {
        let key = kind.key();
        if !self.schemes.iter().any(|(existing, _)| existing == key) {
            debug!("Registering security scheme: {}", key);
            self.schemes.push((key.to_string(), kind.scheme()));
        }
        self.protected
            .insert((path.to_string(), method.to_ascii_lowercase()));
    }

    pub fn requires_auth(&self, path: &str, method: &str) -> bool {
        self.protected
            .contains(&(path.to_string(), method.to_ascii_lowercase()))
    }

    /// Requirement attached to a protected endpoint.
    ///
    /// The requirement always references the first scheme registered in the pass.
    pub fn requirement_for(&self, path: &str, method: &str) -> Option<Vec<SecurityRequirement>> {
        if !self.requires_auth(path, method) {
            return None;
        }
        let (key, _) = self.schemes.first()?;
        let mut requirement = SecurityRequirement::new();
        requirement.insert(key.clone(), Vec::new());
        Some(vec![requirement])
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    pub fn scheme_keys(&self) -> Vec<&str> {
        self.schemes.iter().map(|(key, _)| key.as_str()).collect()
    }

    /// Registered schemes keyed for `components.securitySchemes`
    pub fn schemes(&self) -> BTreeMap<String, SecurityScheme> {
        self.schemes.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_basic_and_bearer() {
        assert_eq!(
            SecurityDetector::detect([("Authorization", "Basic YWRtaW46cGFzcw==")]),
            Some(AuthKind::Basic)
        );
        assert_eq!(
            SecurityDetector::detect([("authorization", "Bearer xyz")]),
            Some(AuthKind::Bearer)
        );
    }

    #[test]
    fn test_detect_api_key_marker() {
        assert_eq!(
            SecurityDetector::detect([("AUTHORIZATION", "X-API-Key abc123")]),
            Some(AuthKind::ApiKey)
        );
    }

    #[test]
    fn test_detect_absent_or_unknown() {
        assert_eq!(SecurityDetector::detect([("Accept", "application/json")]), None);
        assert_eq!(SecurityDetector::detect([("Authorization", "Digest abc")]), None);
        assert_eq!(SecurityDetector::detect(std::iter::empty::<(&str, &str)>()), None);
    }

    #[test]
    fn test_scheme_serialization() {
        let basic = serde_json::to_value(AuthKind::Basic.scheme()).unwrap();
        assert_eq!(basic, serde_json::json!({"type": "http", "scheme": "basic"}));

        let api_key = serde_json::to_value(AuthKind::ApiKey.scheme()).unwrap();
        assert_eq!(
            api_key,
            serde_json::json!({"type": "apiKey", "name": "X-API-Key", "in": "header"})
        );
    }

    #[test]
    fn test_registry_first_scheme_wins() {
        let mut registry = SecurityRegistry::new();
        registry.register(AuthKind::Bearer, "/wp/v2/posts", "GET");
        registry.register(AuthKind::Basic, "/wp/v2/users", "POST");
        registry.register(AuthKind::Bearer, "/wp/v2/media", "GET");

        assert_eq!(registry.scheme_keys(), vec!["bearer_auth", "basic_auth"]);

        let requirement = registry.requirement_for("/wp/v2/users", "post").unwrap();
        assert!(requirement[0].contains_key("bearer_auth"));
    }

    #[test]
    fn test_registry_tracks_protected_endpoints() {
        let mut registry = SecurityRegistry::new();
        assert!(registry.is_empty());
        registry.register(AuthKind::Basic, "/wp/v2/posts/{id}", "DELETE");

        assert!(registry.requires_auth("/wp/v2/posts/{id}", "delete"));
        assert!(!registry.requires_auth("/wp/v2/posts/{id}", "get"));
        assert!(registry.requirement_for("/wp/v2/posts", "get").is_none());
    }
}
