use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::{TokenRecord, TokenTypeHint, base_introspection};
use crate::error::OAuth2Result;
use crate::issuer::TokenIssuer;
use crate::model::{AccessTokenId, Token};
use crate::repository::AccessTokenRepository;
use crate::signer::TokenSigner;

/// JWT claims copied into the introspection response of JWT access tokens
const JWT_CLAIMS: [&str; 5] = ["iat", "nbf", "aud", "iss", "jti"];

/// `access_token`
pub struct AccessTokenTypeHint {
    access_tokens: Arc<dyn AccessTokenRepository>,
    issuer: Arc<TokenIssuer>,
    signer: Option<Arc<dyn TokenSigner>>,
    revoke_refresh_tokens: bool,
}

impl std::fmt::Debug for AccessTokenTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenTypeHint")
            .field("signer", &self.signer)
            .field("revoke_refresh_tokens", &self.revoke_refresh_tokens)
            .finish_non_exhaustive()
    }
}

impl AccessTokenTypeHint {
    /// Create the hint; revocation cascades to the paired refresh token
    pub fn new(access_tokens: Arc<dyn AccessTokenRepository>, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            access_tokens,
            issuer,
            signer: None,
            revoke_refresh_tokens: true,
        }
    }

    /// Verify JWT access tokens with `signer` to expose their claims
    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn TokenSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Whether revoking an access token revokes its refresh token
    #[must_use]
    pub fn revoke_refresh_tokens(mut self, revoke: bool) -> Self {
        self.revoke_refresh_tokens = revoke;
        self
    }
}

#[async_trait]
impl TokenTypeHint for AccessTokenTypeHint {
    fn hint(&self) -> &str {
        "access_token"
    }

    async fn find(&self, token: &str) -> OAuth2Result<Option<TokenRecord>> {
        Ok(self
            .access_tokens
            .find(&AccessTokenId::new(token))
            .await?
            .map(TokenRecord::AccessToken))
    }

    async fn revoke(&self, token: &TokenRecord) -> OAuth2Result<()> {
        let TokenRecord::AccessToken(token) = token else {
            return Ok(());
        };
        self.issuer.revoke_access_token(token.id()).await?;
        if self.revoke_refresh_tokens
            && let Some(refresh_token_id) = token.refresh_token_id()
        {
            debug!(client_id = %token.client_id(), "Revoking the paired refresh token");
            self.issuer.revoke_refresh_token(refresh_token_id).await?;
        }
        Ok(())
    }

    fn introspect(&self, token: &TokenRecord) -> Map<String, Value> {
        let TokenRecord::AccessToken(token) = token else {
            return Map::new();
        };
        let mut data = base_introspection(token, token.is_active());
        if let Some(token_type) = token.parameters().try_get("token_type") {
            data.insert("token_type".to_string(), token_type.clone());
        }
        data.insert("sub".to_string(), Value::from(token.resource_owner_id().as_str()));
        if !token.scopes().is_empty() {
            data.insert("scope".to_string(), Value::from(token.scopes().join(" ")));
        }

        if let Some(signer) = &self.signer
            && token.id().as_str().split('.').count() == 3
            && let Ok(claims) = signer.verify(token.id().as_str())
        {
            for claim in JWT_CLAIMS {
                if let Some(value) = claims.get(claim) {
                    data.insert(claim.to_string(), value.clone());
                }
            }
        }
        data
    }
}
