use std::fmt::Debug;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::model::Client;

/// What to do when a request carries no scope
pub trait ScopePolicy: Send + Sync + Debug {
    /// Policy name, referenced by `Client::scope_policy`
    fn name(&self) -> &str;

    /// Transform the (empty) requested scopes
    ///
    /// # Errors
    ///
    /// Policies may refuse the request with `invalid_scope`.
    fn apply_policy(&self, scopes: Vec<String>, client: &Client) -> OAuth2Result<Vec<String>>;
}

/// Pass the requested scopes through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScopePolicy;

impl ScopePolicy for NoScopePolicy {
    fn name(&self) -> &str {
        "none"
    }

    fn apply_policy(&self, scopes: Vec<String>, _client: &Client) -> OAuth2Result<Vec<String>> {
        Ok(scopes)
    }
}

/// Grant the client's default scopes, falling back to the server's
#[derive(Debug, Clone, Default)]
pub struct DefaultScopePolicy {
    default_scopes: Vec<String>,
}

impl DefaultScopePolicy {
    /// Create the policy with server-wide default scopes
    pub fn new(default_scopes: Vec<String>) -> Self {
        Self { default_scopes }
    }
}

impl ScopePolicy for DefaultScopePolicy {
    fn name(&self) -> &str {
        "default"
    }

    fn apply_policy(&self, _scopes: Vec<String>, client: &Client) -> OAuth2Result<Vec<String>> {
        let client_defaults = client.default_scopes();
        if client_defaults.is_empty() {
            Ok(self.default_scopes.clone())
        } else {
            Ok(client_defaults)
        }
    }
}

/// Refuse requests without scope
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorScopePolicy;

impl ScopePolicy for ErrorScopePolicy {
    fn name(&self) -> &str {
        "error"
    }

    fn apply_policy(&self, _scopes: Vec<String>, _client: &Client) -> OAuth2Result<Vec<String>> {
        Err(OAuth2Error::invalid_scope("No scope was requested."))
    }
}
