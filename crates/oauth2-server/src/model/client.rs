use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ClientId;

/// A registered OAuth 2.0 client
#[derive(Clone, Serialize, Deserialize)]
pub struct Client {
    /// Client identifier
    pub id: ClientId,
    /// Client secret for `client_secret_basic` / `client_secret_post`
    #[serde(default, skip_serializing)]
    pub secret: Option<SecretString>,
    /// Registered redirect URIs, compared by exact match
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    /// Grant types the client may use
    #[serde(default = "default_grant_types")]
    pub grant_types: Vec<String>,
    /// Response types the client may use
    #[serde(default = "default_response_types")]
    pub response_types: Vec<String>,
    /// Token endpoint authentication method (`none` makes the client public)
    #[serde(default = "default_token_endpoint_auth_method")]
    pub token_endpoint_auth_method: String,
    /// Space separated scopes the client may request; server scopes when absent
    #[serde(default)]
    pub scope: Option<String>,
    /// Space separated scopes granted when the request has none
    #[serde(default)]
    pub default_scope: Option<String>,
    /// Scope policy applied to this client when the request has no scope
    #[serde(default)]
    pub scope_policy: Option<String>,
    /// Client JWK Set
    #[serde(default)]
    pub jwks: Option<Value>,
}

impl Client {
    /// Create a client with the given authentication method
    pub fn new(id: impl Into<ClientId>, token_endpoint_auth_method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secret: None,
            redirect_uris: Vec::new(),
            grant_types: default_grant_types(),
            response_types: default_response_types(),
            token_endpoint_auth_method: token_endpoint_auth_method.into(),
            scope: None,
            default_scope: None,
            scope_policy: None,
            jwks: None,
        }
    }

    /// Set the client secret
    #[must_use]
    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(SecretString::new(secret.into()));
        self
    }

    /// Set the registered redirect URIs
    #[must_use]
    pub fn with_redirect_uris(mut self, uris: &[&str]) -> Self {
        self.redirect_uris = uris.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the allowed grant types
    #[must_use]
    pub fn with_grant_types(mut self, grant_types: &[&str]) -> Self {
        self.grant_types = grant_types.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the allowed response types
    #[must_use]
    pub fn with_response_types(mut self, response_types: &[&str]) -> Self {
        self.response_types = response_types.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the allowed scopes
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Set the default scopes and policy
    #[must_use]
    pub fn with_default_scope(mut self, default_scope: impl Into<String>) -> Self {
        self.default_scope = Some(default_scope.into());
        self.scope_policy = Some("default".to_string());
        self
    }

    /// Set the scope policy
    #[must_use]
    pub fn with_scope_policy(mut self, policy: impl Into<String>) -> Self {
        self.scope_policy = Some(policy.into());
        self
    }

    /// Set the JWK Set
    #[must_use]
    pub fn with_jwks(mut self, jwks: Value) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Whether the client may use `grant_type`
    #[must_use]
    pub fn is_grant_type_allowed(&self, grant_type: &str) -> bool {
        self.grant_types.iter().any(|g| g == grant_type)
    }

    /// Whether the client may use `response_type`
    ///
    /// Combined types are compared after sorting their components, so
    /// `"id_token code"` matches a registered `"code id_token"`.
    #[must_use]
    pub fn is_response_type_allowed(&self, response_type: &str) -> bool {
        let wanted = normalize_response_type(response_type);
        self.response_types
            .iter()
            .any(|registered| normalize_response_type(registered) == wanted)
    }

    /// Whether the client has no credentials (`token_endpoint_auth_method=none`)
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.token_endpoint_auth_method == "none"
    }

    /// Client secret value, if any
    #[must_use]
    pub fn secret(&self) -> Option<&str> {
        self.secret.as_ref().map(|s| s.expose_secret().as_str())
    }

    /// Client JWK Set
    #[must_use]
    pub fn public_key_set(&self) -> Option<&Value> {
        self.jwks.as_ref()
    }

    /// Allowed scopes as a list, `None` when unrestricted
    #[must_use]
    pub fn allowed_scopes(&self) -> Option<Vec<String>> {
        self.scope.as_deref().map(split_scope)
    }

    /// Default scopes as a list
    #[must_use]
    pub fn default_scopes(&self) -> Vec<String> {
        self.default_scope.as_deref().map(split_scope).unwrap_or_default()
    }
}

// Manual Debug impl to keep the client secret out of logs
impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("redirect_uris", &self.redirect_uris)
            .field("grant_types", &self.grant_types)
            .field("response_types", &self.response_types)
            .field("token_endpoint_auth_method", &self.token_endpoint_auth_method)
            .field("scope", &self.scope)
            .field("default_scope", &self.default_scope)
            .field("scope_policy", &self.scope_policy)
            .finish_non_exhaustive()
    }
}

fn split_scope(scope: &str) -> Vec<String> {
    scope.split(' ').filter(|s| !s.is_empty()).map(String::from).collect()
}

fn normalize_response_type(response_type: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = response_type.split(' ').filter(|s| !s.is_empty()).collect();
    parts.sort_unstable();
    parts
}

fn default_grant_types() -> Vec<String> {
    vec!["authorization_code".to_string()]
}

fn default_response_types() -> Vec<String> {
    vec!["code".to_string()]
}

fn default_token_endpoint_auth_method() -> String {
    "client_secret_basic".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_client() {
        assert!(Client::new("spa", "none").is_public());
        assert!(!Client::new("backend", "client_secret_basic").is_public());
    }

    #[test]
    fn test_response_type_combination_order() {
        let client = Client::new("c", "none").with_response_types(&["code id_token", "token"]);

        assert!(client.is_response_type_allowed("id_token code"));
        assert!(client.is_response_type_allowed("token"));
        assert!(!client.is_response_type_allowed("code"));
    }

    #[test]
    fn test_debug_redacts_secret() {
        let client = Client::new("c", "client_secret_post").with_secret("hunter2");
        let debug = format!("{client:?}");

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
        assert_eq!(client.secret(), Some("hunter2"));
    }

    #[test]
    fn test_deserialize_defaults() {
        let client: Client = serde_json::from_str(
            r#"{"id": "c1", "redirect_uris": ["https://c.example/cb"], "scope": "read write"}"#,
        )
        .unwrap();

        assert!(client.is_grant_type_allowed("authorization_code"));
        assert_eq!(client.token_endpoint_auth_method, "client_secret_basic");
        assert_eq!(client.allowed_scopes(), Some(vec!["read".to_string(), "write".to_string()]));
    }
}
