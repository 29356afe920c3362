//! Token type hints for revocation (RFC 7009) and introspection (RFC 7662)
//!
//! Each hint knows how to find, revoke and describe one token kind. The
//! [`TokenTypeHintManager`] tries the hinted kind first, then every kind
//! in registration order.

mod access_token;
mod auth_code;
mod refresh_token;

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

pub use access_token::AccessTokenTypeHint;
pub use auth_code::AuthCodeTypeHint;
pub use refresh_token::RefreshTokenTypeHint;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::model::{AccessToken, AuthCode, ClientId, RefreshToken, Token};

/// A token found by a hint
#[derive(Debug, Clone, PartialEq)]
pub enum TokenRecord {
    /// Access token
    AccessToken(AccessToken),
    /// Refresh token
    RefreshToken(RefreshToken),
    /// Authorization code
    AuthCode(AuthCode),
}

impl TokenRecord {
    fn token(&self) -> &dyn Token {
        match self {
            Self::AccessToken(token) => token,
            Self::RefreshToken(token) => token,
            Self::AuthCode(code) => code,
        }
    }

    /// Client the token was issued to
    pub fn client_id(&self) -> &ClientId {
        self.token().client_id()
    }

    /// Raw token value
    pub fn token_id(&self) -> &str {
        self.token().token_id()
    }

    /// Whether the token can still be used
    pub fn is_active(&self) -> bool {
        self.token().is_active()
    }
}

/// One `token_type_hint` value
#[async_trait]
pub trait TokenTypeHint: Send + Sync + Debug {
    /// The `token_type_hint` value
    fn hint(&self) -> &str;

    /// Find a token of this kind
    ///
    /// # Errors
    ///
    /// Returns storage errors as they occur.
    async fn find(&self, token: &str) -> OAuth2Result<Option<TokenRecord>>;

    /// Revoke a token found by [`find`](Self::find)
    ///
    /// # Errors
    ///
    /// Returns storage errors as they occur.
    async fn revoke(&self, token: &TokenRecord) -> OAuth2Result<()>;

    /// Introspection response members for a token found by [`find`](Self::find)
    fn introspect(&self, token: &TokenRecord) -> Map<String, Value>;
}

/// Registry of token type hints
#[derive(Debug, Default)]
pub struct TokenTypeHintManager {
    hints: Vec<Arc<dyn TokenTypeHint>>,
}

impl TokenTypeHintManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hint, replacing one with the same name
    pub fn add(&mut self, hint: Arc<dyn TokenTypeHint>) {
        self.hints.retain(|h| h.hint() != hint.hint());
        self.hints.push(hint);
    }

    /// Whether `hint` is registered
    pub fn has(&self, hint: &str) -> bool {
        self.hints.iter().any(|h| h.hint() == hint)
    }

    /// Registered hints, in probing order
    pub fn names(&self) -> Vec<&str> {
        self.hints.iter().map(|h| h.hint()).collect()
    }

    /// Look up a hint sent by a client
    ///
    /// # Errors
    ///
    /// Returns `unsupported_token_type` for unregistered hints.
    pub fn get(&self, hint: &str) -> OAuth2Result<Arc<dyn TokenTypeHint>> {
        self.hints
            .iter()
            .find(|h| h.hint() == hint)
            .cloned()
            .ok_or_else(|| {
                OAuth2Error::unsupported_token_type(format!(
                    "The token type hint \"{hint}\" is not supported."
                ))
            })
    }

    /// Find a token, trying the hinted kind first
    ///
    /// # Errors
    ///
    /// Returns `unsupported_token_type` for an unregistered hint and storage
    /// errors as they occur.
    pub async fn find(
        &self,
        token: &str,
        hint: Option<&str>,
    ) -> OAuth2Result<Option<(Arc<dyn TokenTypeHint>, TokenRecord)>> {
        let mut candidates = Vec::with_capacity(self.hints.len());
        if let Some(hint) = hint {
            candidates.push(self.get(hint)?);
        }
        candidates.extend(
            self.hints
                .iter()
                .filter(|h| hint.is_none_or(|hint| h.hint() != hint))
                .cloned(),
        );

        for candidate in candidates {
            if let Some(record) = candidate.find(token).await? {
                return Ok(Some((candidate, record)));
            }
        }
        Ok(None)
    }
}

/// Members shared by every introspection response
pub(crate) fn base_introspection(token: &dyn Token, active: bool) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("active".to_string(), Value::from(active));
    data.insert("client_id".to_string(), Value::from(token.client_id().as_str()));
    data.insert("exp".to_string(), Value::from(token.expires_at().timestamp()));
    data
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::event::RecordingEventPublisher;
    use crate::issuer::testing::issuer;
    use crate::issuer::{TokenIssuer, TokenRequest};
    use crate::memory::InMemoryStore;
    use crate::model::{ResourceOwnerId, UserAccountId};

    fn manager(store: &InMemoryStore, issuer: Arc<TokenIssuer>) -> TokenTypeHintManager {
        let mut manager = TokenTypeHintManager::new();
        manager.add(Arc::new(AccessTokenTypeHint::new(
            store.access_tokens.clone(),
            issuer.clone(),
        )));
        manager.add(Arc::new(RefreshTokenTypeHint::new(
            store.refresh_tokens.clone(),
            issuer.clone(),
        )));
        manager.add(Arc::new(AuthCodeTypeHint::new(store.auth_codes.clone(), issuer)));
        manager
    }

    fn request() -> TokenRequest {
        TokenRequest::new(ResourceOwnerId::from(UserAccountId::new("alice")), "web".into())
    }

    #[tokio::test]
    async fn test_find_falls_back_to_other_kinds() {
        // GIVEN a refresh token
        let store = InMemoryStore::new();
        let events = RecordingEventPublisher::new();
        let issuer = Arc::new(issuer(&store, &events));
        let refresh = issuer.create_refresh_token(&request()).await.unwrap();
        let manager = manager(&store, issuer);

        // WHEN looking it up with the wrong hint
        let (hint, record) = manager
            .find(refresh.id().as_str(), Some("access_token"))
            .await
            .unwrap()
            .unwrap();

        // THEN the refresh token hint found it
        assert_eq!(hint.hint(), "refresh_token");
        assert_eq!(record, TokenRecord::RefreshToken(refresh));
    }

    #[tokio::test]
    async fn test_find_unknown_token_and_hint() {
        let store = InMemoryStore::new();
        let events = RecordingEventPublisher::new();
        let manager = manager(&store, Arc::new(issuer(&store, &events)));

        assert!(manager.find("nope", None).await.unwrap().is_none());
        assert_eq!(
            manager.find("nope", Some("id_token")).await.unwrap_err().code,
            ErrorCode::UnsupportedTokenType
        );
        assert_eq!(manager.names(), vec!["access_token", "refresh_token", "auth_code"]);
    }
}
