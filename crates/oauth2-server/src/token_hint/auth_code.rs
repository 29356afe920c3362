use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{TokenRecord, TokenTypeHint, base_introspection};
use crate::error::OAuth2Result;
use crate::issuer::TokenIssuer;
use crate::model::{AuthCodeId, Token};
use crate::repository::AuthCodeRepository;

/// `auth_code`
pub struct AuthCodeTypeHint {
    auth_codes: Arc<dyn AuthCodeRepository>,
    issuer: Arc<TokenIssuer>,
}

impl std::fmt::Debug for AuthCodeTypeHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCodeTypeHint").finish_non_exhaustive()
    }
}

impl AuthCodeTypeHint {
    /// Create the hint
    pub fn new(auth_codes: Arc<dyn AuthCodeRepository>, issuer: Arc<TokenIssuer>) -> Self {
        Self { auth_codes, issuer }
    }
}

#[async_trait]
impl TokenTypeHint for AuthCodeTypeHint {
    fn hint(&self) -> &str {
        "auth_code"
    }

    async fn find(&self, token: &str) -> OAuth2Result<Option<TokenRecord>> {
        Ok(self
            .auth_codes
            .find(&AuthCodeId::new(token))
            .await?
            .map(TokenRecord::AuthCode))
    }

    async fn revoke(&self, token: &TokenRecord) -> OAuth2Result<()> {
        if let TokenRecord::AuthCode(code) = token {
            self.issuer.revoke_auth_code(code.id()).await?;
        }
        Ok(())
    }

    fn introspect(&self, token: &TokenRecord) -> Map<String, Value> {
        let TokenRecord::AuthCode(code) = token else {
            return Map::new();
        };
        let mut data = base_introspection(code, code.is_active());
        if !code.scopes().is_empty() {
            data.insert("scp".to_string(), Value::from(code.scopes().join(" ")));
        }
        data
    }
}
