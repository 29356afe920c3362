//! Authorization server configuration
//!
//! Everything here is plain data deserializable from any serde format. The
//! components take the values they need at construction time; nothing reads
//! configuration lazily.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OAuth2Error, OAuth2Result};

/// Authorization server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Issuer identifier (`iss` of ID Tokens and JWT access tokens)
    pub issuer: String,
    /// Realm advertised in `WWW-Authenticate` challenges
    #[serde(default = "default_realm")]
    pub realm: String,
    /// Access token lifetime in seconds
    #[serde(default = "default_access_token_lifetime")]
    pub access_token_lifetime: u64,
    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_token_lifetime")]
    pub refresh_token_lifetime: u64,
    /// Authorization code lifetime in seconds
    #[serde(default = "default_auth_code_lifetime")]
    pub auth_code_lifetime: u64,
    /// ID Token lifetime in seconds
    #[serde(default = "default_id_token_lifetime")]
    pub id_token_lifetime: u64,
    /// Require PKCE for clients using `token_endpoint_auth_method=none`
    #[serde(default = "default_true")]
    pub enforce_pkce_for_public_clients: bool,
    /// Revoking an access token also revokes its paired refresh token
    #[serde(default = "default_true")]
    pub refresh_tokens_revoked_with_access_tokens: bool,
    /// Issue a new refresh token (revoking the old one) on refresh
    #[serde(default)]
    pub refresh_token_rotation: bool,
    /// Issue refresh tokens from codes even when `offline_access` is not granted
    #[serde(default)]
    pub refresh_token_without_offline_access: bool,
    /// Allow the client to pick a token type with the `token_type` parameter
    #[serde(default)]
    pub allow_token_type_parameter: bool,
    /// Scope policy applied when a request carries no scope (`none`, `default`, `error`)
    #[serde(default = "default_scope_policy")]
    pub scope_policy: String,
    /// Scopes granted by the `default` policy when the client has none configured
    #[serde(default)]
    pub default_scopes: Vec<String>,
    /// Scopes this server knows about
    #[serde(default = "default_available_scopes")]
    pub available_scopes: Vec<String>,
    /// Accept a `callback` parameter on revocation and introspection (JSONP)
    #[serde(default)]
    pub allow_jsonp_callback: bool,
    /// Accept GET requests on the revocation and introspection endpoints
    #[serde(default)]
    pub allow_get_method: bool,
}

impl ServerConfig {
    /// Create a configuration with defaults for the given issuer
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            realm: default_realm(),
            access_token_lifetime: default_access_token_lifetime(),
            refresh_token_lifetime: default_refresh_token_lifetime(),
            auth_code_lifetime: default_auth_code_lifetime(),
            id_token_lifetime: default_id_token_lifetime(),
            enforce_pkce_for_public_clients: true,
            refresh_tokens_revoked_with_access_tokens: true,
            refresh_token_rotation: false,
            refresh_token_without_offline_access: false,
            allow_token_type_parameter: false,
            scope_policy: default_scope_policy(),
            default_scopes: Vec::new(),
            available_scopes: default_available_scopes(),
            allow_jsonp_callback: false,
            allow_get_method: false,
        }
    }

    /// Set the available scopes
    #[must_use]
    pub fn with_available_scopes(mut self, scopes: &[&str]) -> Self {
        self.available_scopes = scopes.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Set the no-scope policy and its default scopes
    #[must_use]
    pub fn with_scope_policy(mut self, policy: impl Into<String>, default_scopes: &[&str]) -> Self {
        self.scope_policy = policy.into();
        self.default_scopes = default_scopes.iter().map(|s| (*s).to_string()).collect();
        self
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an internal error when the issuer is not an absolute URL, a
    /// lifetime is zero, or a default scope is not available.
    pub fn validate(&self) -> OAuth2Result<()> {
        let issuer = Url::parse(&self.issuer)
            .map_err(|e| OAuth2Error::internal(format!("Invalid issuer \"{}\": {e}", self.issuer)))?;
        if issuer.fragment().is_some() || issuer.query().is_some() {
            return Err(OAuth2Error::internal(
                "The issuer must not contain a query or fragment component.",
            ));
        }

        for (name, value) in [
            ("access_token_lifetime", self.access_token_lifetime),
            ("refresh_token_lifetime", self.refresh_token_lifetime),
            ("auth_code_lifetime", self.auth_code_lifetime),
            ("id_token_lifetime", self.id_token_lifetime),
        ] {
            if value == 0 {
                return Err(OAuth2Error::internal(format!("\"{name}\" must be positive.")));
            }
        }

        if let Some(scope) = self
            .default_scopes
            .iter()
            .find(|s| !self.available_scopes.contains(s))
        {
            return Err(OAuth2Error::internal(format!(
                "Default scope \"{scope}\" is not an available scope."
            )));
        }

        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("http://localhost")
    }
}

fn default_realm() -> String {
    "Service".to_string()
}

fn default_access_token_lifetime() -> u64 {
    3600
}

fn default_refresh_token_lifetime() -> u64 {
    60 * 60 * 24 * 14
}

fn default_auth_code_lifetime() -> u64 {
    30
}

fn default_id_token_lifetime() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_scope_policy() -> String {
    "none".to_string()
}

fn default_available_scopes() -> Vec<String> {
    ["openid", "offline_access", "profile", "email", "address", "phone"]
        .into_iter()
        .map(String::from)
        .collect()
}
