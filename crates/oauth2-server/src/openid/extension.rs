use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::claims::requested_id_token_claims;
use super::id_token::{IdTokenBuilder, IdTokenFactory};
use crate::endpoint::TokenEndpointExtension;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::grant_type::GrantTypeData;
use crate::model::AccessToken;
use crate::repository::UserAccountRepository;

/// Adds an `id_token` to `authorization_code` token responses granting `openid`
///
/// `nonce`, `claims` and `claims_locales` come from the authorization
/// request stored with the code.
pub struct OpenIdConnectExtension {
    factory: Arc<IdTokenFactory>,
    user_accounts: Arc<dyn UserAccountRepository>,
}

impl std::fmt::Debug for OpenIdConnectExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenIdConnectExtension")
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}

impl OpenIdConnectExtension {
    /// Create the extension
    pub fn new(factory: Arc<IdTokenFactory>, user_accounts: Arc<dyn UserAccountRepository>) -> Self {
        Self {
            factory,
            user_accounts,
        }
    }
}

#[async_trait]
impl TokenEndpointExtension for OpenIdConnectExtension {
    async fn process(
        &self,
        data: &GrantTypeData,
        access_token: &AccessToken,
        response: &mut Map<String, Value>,
    ) -> OAuth2Result<()> {
        let Some(code) = &data.auth_code else {
            return Ok(());
        };
        if !data.scopes.iter().any(|s| s == "openid") {
            return Ok(());
        }
        let Some(user_account_id) = data.resource_owner_id.user_account_id() else {
            return Ok(());
        };
        let user_account = self
            .user_accounts
            .find(user_account_id)
            .await?
            .ok_or_else(|| OAuth2Error::internal("The resource owner of the code does not exist."))?;

        let builder = IdTokenBuilder::new(user_account, data.client.id.clone(), data.scopes.clone())
            .with_nonce(code.query_parameter("nonce"))
            .with_access_token(Some(access_token.id().as_str()))
            .with_requested_claims(requested_id_token_claims(code.query_parameter("claims")))
            .with_claims_locales(code.query_parameter("claims_locales"));
        let id_token = self.factory.create(&builder).await?;
        response.insert("id_token".to_string(), Value::from(id_token.id().as_str()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use jsonwebtoken::Algorithm;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::event::RecordingEventPublisher;
    use crate::issuer::TokenRequest;
    use crate::issuer::testing::issuer;
    use crate::memory::InMemoryStore;
    use crate::model::{Client, ResourceOwnerId, UserAccount, UserAccountId};
    use crate::signer::{JwtSigner, TokenSigner};

    #[tokio::test]
    async fn test_id_token_added_for_openid_code_exchange() {
        // GIVEN a code granted openid for alice with a nonce
        let store = InMemoryStore::new();
        store.user_accounts.insert(UserAccount::new("alice"));
        let events = RecordingEventPublisher::new();
        let issuer = issuer(&store, &events);
        let request = TokenRequest::new(ResourceOwnerId::from(UserAccountId::new("alice")), "web".into())
            .with_scopes(vec!["openid".to_string()]);
        let code = issuer
            .create_auth_code(
                &request,
                BTreeMap::from([("nonce".to_string(), "n-1".to_string())]),
                "https://app.example/cb",
                false,
            )
            .await
            .unwrap();
        let access_token = issuer.create_access_token(&request, None).await.unwrap();

        let signer = Arc::new(JwtSigner::hmac(Algorithm::HS256, b"0123456789abcdef0123456789abcdef").unwrap());
        let extension = OpenIdConnectExtension::new(
            Arc::new(IdTokenFactory::new(
                "https://issuer.example",
                signer.clone(),
                store.id_tokens.clone(),
                Arc::new(events.clone()),
                600,
            )),
            store.user_accounts.clone(),
        );
        let mut data = GrantTypeData::new(Client::new("web", "client_secret_basic"));
        data.resource_owner_id = ResourceOwnerId::from(UserAccountId::new("alice"));
        data.scopes = vec!["openid".to_string()];
        data.auth_code = Some(code);

        // WHEN completing the token response
        let mut response = access_token.response_data();
        extension.process(&data, &access_token, &mut response).await.unwrap();

        // THEN the ID Token is bound to the nonce and the access token
        let claims = signer.verify(response["id_token"].as_str().unwrap()).unwrap();
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["nonce"], "n-1");
        assert!(claims.contains_key("at_hash"));
    }

    #[tokio::test]
    async fn test_no_id_token_without_code() {
        let store = InMemoryStore::new();
        let events = RecordingEventPublisher::new();
        let issuer = issuer(&store, &events);
        let signer = Arc::new(JwtSigner::hmac(Algorithm::HS256, b"0123456789abcdef0123456789abcdef").unwrap());
        let extension = OpenIdConnectExtension::new(
            Arc::new(IdTokenFactory::new(
                "https://issuer.example",
                signer,
                store.id_tokens.clone(),
                Arc::new(events.clone()),
                600,
            )),
            store.user_accounts.clone(),
        );
        let mut data = GrantTypeData::new(Client::new("svc", "client_secret_basic"));
        data.scopes = vec!["openid".to_string()];
        let request = TokenRequest::new(data.resource_owner_id.clone(), "svc".into());
        let access_token = issuer.create_access_token(&request, None).await.unwrap();

        let mut response = access_token.response_data();
        extension.process(&data, &access_token, &mut response).await.unwrap();

        assert!(!response.contains_key("id_token"));
    }
}
