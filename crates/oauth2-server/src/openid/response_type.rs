use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::claims::requested_id_token_claims;
use super::id_token::{IdTokenBuilder, IdTokenFactory};
use crate::error::{OAuth2Error, OAuth2Result};
use crate::response_mode::ResponseMode;
use crate::response_type::{Authorization, ResponseType};

/// `id_token` (OpenID Connect Core §3.2, §3.3)
///
/// Only active when `openid` is granted. The ID Token is built on finalize
/// so that it can hash the code and access token of the same response.
#[derive(Debug)]
pub struct IdTokenResponseType {
    factory: Arc<IdTokenFactory>,
}

impl IdTokenResponseType {
    /// Create the handler
    pub fn new(factory: Arc<IdTokenFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ResponseType for IdTokenResponseType {
    fn response_type(&self) -> &str {
        "id_token"
    }

    fn associated_grant_types(&self) -> Vec<&'static str> {
        vec![]
    }

    fn response_mode(&self) -> ResponseMode {
        ResponseMode::Fragment
    }

    fn check_authorization(&self, authorization: &Authorization) -> OAuth2Result<()> {
        if authorization.has_scope("openid")
            && authorization
                .query_param("nonce")
                .is_none_or(str::is_empty)
        {
            return Err(OAuth2Error::invalid_request(
                "The parameter \"nonce\" is mandatory using \"id_token\" response type.",
            ));
        }
        Ok(())
    }

    async fn prepare_authorization(
        &self,
        _authorization: &mut Authorization,
    ) -> OAuth2Result<BTreeMap<String, String>> {
        Ok(BTreeMap::new())
    }

    async fn finalize_authorization(
        &self,
        response_parameters: &mut BTreeMap<String, String>,
        authorization: &Authorization,
    ) -> OAuth2Result<()> {
        if !authorization.has_scope("openid") {
            return Ok(());
        }
        let builder = IdTokenBuilder::new(
            authorization.user_account.clone(),
            authorization.client.id.clone(),
            authorization.scopes.clone(),
        )
        .with_nonce(authorization.query_param("nonce"))
        .with_access_token(authorization.data("access_token").and_then(Value::as_str))
        .with_auth_code(authorization.data("code").and_then(Value::as_str))
        .with_requested_claims(requested_id_token_claims(authorization.query_param("claims")))
        .with_claims_locales(authorization.query_param("claims_locales"));

        let id_token = self.factory.create(&builder).await?;
        response_parameters.insert("id_token".to_string(), id_token.id().as_str().to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::Algorithm;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::event::RecordingEventPublisher;
    use crate::memory::InMemoryStore;
    use crate::model::{Client, UserAccount};
    use crate::signer::{JwtSigner, TokenSigner};

    fn authorization(query: &[(&str, &str)], scopes: &[&str]) -> Authorization {
        Authorization::new(
            Client::new("web", "client_secret_basic"),
            UserAccount::new("alice").with_attribute("name", "Alice"),
            query
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            "id_token".to_string(),
            ResponseMode::Fragment,
            "https://app.example/cb".to_string(),
            scopes.iter().map(|s| (*s).to_string()).collect(),
            Vec::new(),
        )
    }

    fn handler(store: &InMemoryStore, signer: Arc<JwtSigner>) -> IdTokenResponseType {
        IdTokenResponseType::new(Arc::new(IdTokenFactory::new(
            "https://issuer.example",
            signer,
            store.id_tokens.clone(),
            Arc::new(RecordingEventPublisher::new()),
            600,
        )))
    }

    fn signer() -> Arc<JwtSigner> {
        Arc::new(JwtSigner::hmac(Algorithm::HS256, b"0123456789abcdef0123456789abcdef").unwrap())
    }

    #[test]
    fn test_nonce_is_mandatory_with_openid() {
        let store = InMemoryStore::new();
        let handler = handler(&store, signer());

        let err = handler
            .check_authorization(&authorization(&[], &["openid"]))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert_eq!(
            err.description.as_deref(),
            Some("The parameter \"nonce\" is mandatory using \"id_token\" response type.")
        );

        assert!(
            handler
                .check_authorization(&authorization(&[("nonce", "n-1")], &["openid"]))
                .is_ok()
        );
        assert!(handler.check_authorization(&authorization(&[], &["profile"])).is_ok());
    }

    #[tokio::test]
    async fn test_finalize_adds_signed_id_token() {
        // GIVEN an authorization granting openid and a code issued earlier
        let store = InMemoryStore::new();
        let signer = signer();
        let handler = handler(&store, signer.clone());
        let mut auth = authorization(&[("nonce", "n-1")], &["openid", "profile"]);
        auth.set_data("code", "the-code");

        // WHEN finalizing
        let mut params = handler.prepare_authorization(&mut auth).await.unwrap();
        handler.finalize_authorization(&mut params, &auth).await.unwrap();

        // THEN the ID Token carries the nonce, c_hash and profile claims
        let claims = signer.verify(&params["id_token"]).unwrap();
        assert_eq!(claims["nonce"], "n-1");
        assert_eq!(claims["name"], "Alice");
        assert!(claims.contains_key("c_hash"));
        assert!(!claims.contains_key("at_hash"));
    }

    #[tokio::test]
    async fn test_finalize_skipped_without_openid() {
        let store = InMemoryStore::new();
        let handler = handler(&store, signer());
        let auth = authorization(&[], &["profile"]);

        let mut params = BTreeMap::new();
        handler.finalize_authorization(&mut params, &auth).await.unwrap();

        assert!(params.is_empty());
    }
}
