//! Scope parsing, validation and policies (RFC 6749 §3.3).
//!
//! ```text
//! scope       = scope-token *( SP scope-token )
//! scope-token = 1*( %x21 / %x23-5B / %x5D-7E )
//! ```

mod policy;

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub use policy::{DefaultScopePolicy, ErrorScopePolicy, NoScopePolicy, ScopePolicy};

use crate::error::{OAuth2Error, OAuth2Result};
use crate::model::Client;

/// Scope handling for the authorization and token endpoints
#[derive(Debug)]
pub struct ScopeManager {
    available_scopes: Vec<String>,
    policies: BTreeMap<String, Arc<dyn ScopePolicy>>,
    default_policy: String,
}

impl ScopeManager {
    /// Create a manager with the built-in `none` policy as default
    pub fn new(available_scopes: Vec<String>) -> Self {
        let mut manager = Self {
            available_scopes,
            policies: BTreeMap::new(),
            default_policy: NoScopePolicy.name().to_string(),
        };
        manager.add_policy(Arc::new(NoScopePolicy));
        manager
    }

    /// Register a policy
    pub fn add_policy(&mut self, policy: Arc<dyn ScopePolicy>) {
        self.policies.insert(policy.name().to_string(), policy);
    }

    /// Choose the policy used for clients without their own
    ///
    /// # Errors
    ///
    /// Returns an internal error when the policy is not registered.
    pub fn set_default_policy(&mut self, name: &str) -> OAuth2Result<()> {
        self.policy(name)?;
        self.default_policy = name.to_string();
        Ok(())
    }

    /// Look up a registered policy
    ///
    /// # Errors
    ///
    /// Returns an internal error for unknown policy names (a configuration
    /// mistake, not a client error).
    pub fn policy(&self, name: &str) -> OAuth2Result<Arc<dyn ScopePolicy>> {
        self.policies.get(name).cloned().ok_or_else(|| {
            OAuth2Error::internal(format!("The scope policy \"{name}\" is not supported."))
        })
    }

    /// Registered policy names
    pub fn policy_names(&self) -> Vec<&str> {
        self.policies.keys().map(String::as_str).collect()
    }

    /// Scopes known to this server
    pub fn available_scopes(&self) -> &[String] {
        &self.available_scopes
    }

    /// Scopes `client` may obtain: its own list when set, server scopes otherwise
    pub fn available_scopes_for_client(&self, client: &Client) -> Vec<String> {
        client
            .allowed_scopes()
            .unwrap_or_else(|| self.available_scopes.clone())
    }

    /// Split a `scope` parameter value into scope tokens
    ///
    /// The empty string yields no scopes.
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` when a token contains illegal characters or
    /// appears more than once.
    pub fn convert_to_array(scope: &str) -> OAuth2Result<Vec<String>> {
        if scope.is_empty() {
            return Ok(Vec::new());
        }
        let scopes: Vec<String> = scope.split(' ').map(String::from).collect();
        Self::check_scope_charset(&scopes)?;
        Self::check_scope_used_once(&scopes)?;
        Ok(scopes)
    }

    /// Check every scope token against the RFC 6749 §3.3 character set
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` on the first illegal token.
    pub fn check_scope_charset(scopes: &[String]) -> OAuth2Result<()> {
        if scopes.iter().all(|scope| is_valid_scope_token(scope)) {
            Ok(())
        } else {
            Err(OAuth2Error::invalid_scope("Scope contains illegal characters."))
        }
    }

    /// Check that no scope appears twice
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` naming the first duplicate.
    pub fn check_scope_used_once(scopes: &[String]) -> OAuth2Result<()> {
        let mut seen = HashSet::new();
        match scopes.iter().find(|scope| !seen.insert(scope.as_str())) {
            Some(duplicate) => Err(OAuth2Error::invalid_scope(format!(
                "Scope '{duplicate}' appears more than once."
            ))),
            None => Ok(()),
        }
    }

    /// Whether every requested scope is available
    pub fn are_request_scopes_available(requested: &[String], available: &[String]) -> bool {
        requested.iter().all(|scope| available.contains(scope))
    }

    /// Validate requested scopes and apply the client's policy when empty
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` for illegal or duplicated scopes and whatever
    /// the policy raises; internal errors for an unknown client policy.
    pub fn resolve_scopes(&self, requested: Vec<String>, client: &Client) -> OAuth2Result<Vec<String>> {
        if !requested.is_empty() {
            Self::check_scope_charset(&requested)?;
            Self::check_scope_used_once(&requested)?;
            return Ok(requested);
        }

        let name = client
            .scope_policy
            .as_deref()
            .unwrap_or(self.default_policy.as_str());
        self.policy(name)?.apply_policy(requested, client)
    }

    /// Check that `client` may obtain every scope in `scopes`
    ///
    /// # Errors
    ///
    /// Returns `invalid_scope` naming the unavailable scopes.
    pub fn check_scopes_available(&self, scopes: &[String], client: &Client) -> OAuth2Result<()> {
        let available = self.available_scopes_for_client(client);
        if Self::are_request_scopes_available(scopes, &available) {
            Ok(())
        } else {
            Err(OAuth2Error::invalid_scope(format!(
                "An unsupported scope was requested. Available scopes are {}.",
                available.join(", ")
            )))
        }
    }
}

fn is_valid_scope_token(scope: &str) -> bool {
    !scope.is_empty()
        && scope
            .bytes()
            .all(|b| matches!(b, 0x21 | 0x23..=0x5B | 0x5D..=0x7E))
}
