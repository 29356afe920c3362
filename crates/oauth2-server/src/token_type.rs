//! Access token types (RFC 6749 §7.1)

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{AuthenticateChallenge, OAuth2Error, OAuth2Result};

/// An access token type
pub trait TokenType: Send + Sync + Debug {
    /// The `token_type` value
    fn name(&self) -> &str;

    /// Authentication scheme used in `WWW-Authenticate` challenges
    fn scheme(&self) -> &str;

    /// Parameters added to every token of this type (`token_type` included)
    fn additional_information(&self) -> BTreeMap<String, Value> {
        BTreeMap::from([("token_type".to_string(), Value::from(self.name()))])
    }
}

/// Bearer tokens (RFC 6750)
#[derive(Debug, Clone, Copy, Default)]
pub struct BearerToken;

impl TokenType for BearerToken {
    fn name(&self) -> &str {
        "Bearer"
    }

    fn scheme(&self) -> &str {
        "Bearer"
    }
}

/// Registry of token types with a default
#[derive(Debug)]
pub struct TokenTypeManager {
    types: Vec<Arc<dyn TokenType>>,
    default: String,
    allow_token_type_parameter: bool,
}

impl TokenTypeManager {
    /// Registry with `Bearer` as the default type
    pub fn new() -> Self {
        Self {
            types: vec![Arc::new(BearerToken)],
            default: BearerToken.name().to_string(),
            allow_token_type_parameter: false,
        }
    }

    /// Let clients choose a registered type with the `token_type` parameter
    #[must_use]
    pub fn allow_token_type_parameter(mut self, allow: bool) -> Self {
        self.allow_token_type_parameter = allow;
        self
    }

    /// Register a token type
    pub fn add(&mut self, token_type: Arc<dyn TokenType>) {
        self.types.retain(|t| t.name() != token_type.name());
        self.types.push(token_type);
    }

    /// Choose the default token type
    ///
    /// # Errors
    ///
    /// Returns an internal error when the type is not registered.
    pub fn set_default(&mut self, name: &str) -> OAuth2Result<()> {
        self.get(name)?;
        self.default = name.to_string();
        Ok(())
    }

    /// Look up a token type
    ///
    /// # Errors
    ///
    /// Returns an internal error for unregistered names.
    pub fn get(&self, name: &str) -> OAuth2Result<Arc<dyn TokenType>> {
        self.types
            .iter()
            .find(|t| t.name() == name)
            .cloned()
            .ok_or_else(|| {
                OAuth2Error::internal(format!("The token type \"{name}\" is not supported."))
            })
    }

    /// The default token type
    ///
    /// # Errors
    ///
    /// Returns an internal error when the default was removed.
    pub fn default_type(&self) -> OAuth2Result<Arc<dyn TokenType>> {
        self.get(&self.default)
    }

    /// Token type for a request carrying an optional `token_type` parameter
    ///
    /// # Errors
    ///
    /// Returns `invalid_request` for an unregistered requested type.
    pub fn find_for_request(&self, requested: Option<&str>) -> OAuth2Result<Arc<dyn TokenType>> {
        match requested {
            Some(name) if self.allow_token_type_parameter => {
                self.types.iter().find(|t| t.name() == name).cloned().ok_or_else(|| {
                    OAuth2Error::invalid_request(format!("Unsupported token type \"{name}\"."))
                })
            }
            _ => self.default_type(),
        }
    }

    /// Challenges for every registered type
    pub fn challenges(&self, realm: &str) -> Vec<AuthenticateChallenge> {
        self.types
            .iter()
            .map(|t| AuthenticateChallenge::new(t.scheme(), Some(realm.to_string())))
            .collect()
    }
}

impl Default for TokenTypeManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct MacToken;

    impl TokenType for MacToken {
        fn name(&self) -> &str {
            "mac"
        }

        fn scheme(&self) -> &str {
            "MAC"
        }
    }

    #[test]
    fn test_bearer_is_default() {
        let manager = TokenTypeManager::new();
        let token_type = manager.default_type().unwrap();

        assert_eq!(token_type.name(), "Bearer");
        assert_eq!(token_type.additional_information()["token_type"], "Bearer");
    }

    #[test]
    fn test_requested_type_only_when_allowed() {
        let mut manager = TokenTypeManager::new();
        manager.add(Arc::new(MacToken));

        assert_eq!(manager.find_for_request(Some("mac")).unwrap().name(), "Bearer");

        let manager = {
            let mut m = TokenTypeManager::new().allow_token_type_parameter(true);
            m.add(Arc::new(MacToken));
            m
        };
        assert_eq!(manager.find_for_request(Some("mac")).unwrap().name(), "mac");
        assert!(manager.find_for_request(Some("pop")).is_err());
        assert_eq!(manager.challenges("Service").len(), 2);
    }
}
