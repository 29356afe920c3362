use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{TokenRecord, TokenTypeHint, base_introspection};
use crate::error::OAuth2Result;
use crate::issuer::TokenIssuer;
use crate::model::{RefreshTokenId, Token};
use crate::repository::RefreshTokenRepository;

/// `refresh_token`
///
/// Revoking a refresh token revokes every access token it issued
/// (RFC 7009 §2.1).
pub struct RefreshTokenTypeHint {
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    issuer: Arc<TokenIssuer>,
}

impl std::fmt::Debug for RefreshTokenTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenTypeHint").finish_non_exhaustive()
    }
}

impl RefreshTokenTypeHint {
    /// Create the hint
    pub fn new(refresh_tokens: Arc<dyn RefreshTokenRepository>, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            refresh_tokens,
            issuer,
        }
    }
}

#[async_trait]
impl TokenTypeHint for RefreshTokenTypeHint {
    fn hint(&self) -> &str {
        "refresh_token"
    }

    async fn find(&self, token: &str) -> OAuth2Result<Option<TokenRecord>> {
        Ok(self
            .refresh_tokens
            .find(&RefreshTokenId::new(token))
            .await?
            .map(TokenRecord::RefreshToken))
    }

    async fn revoke(&self, token: &TokenRecord) -> OAuth2Result<()> {
        let TokenRecord::RefreshToken(token) = token else {
            return Ok(());
        };
        let revoked = self.issuer.revoke_refresh_token(token.id()).await?;
        let access_token_ids = revoked
            .as_ref()
            .map_or_else(|| token.access_token_ids(), |t| t.access_token_ids());
        for access_token_id in access_token_ids {
            self.issuer.revoke_access_token(access_token_id).await?;
        }
        Ok(())
    }

    fn introspect(&self, token: &TokenRecord) -> Map<String, Value> {
        let TokenRecord::RefreshToken(token) = token else {
            return Map::new();
        };
        let mut data = base_introspection(token, token.is_active());
        data.insert("sub".to_string(), Value::from(token.resource_owner_id().as_str()));
        if !token.scopes().is_empty() {
            data.insert("scope".to_string(), Value::from(token.scopes().join(" ")));
        }
        data
    }
}
