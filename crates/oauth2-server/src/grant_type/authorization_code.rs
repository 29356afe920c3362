use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{GrantType, GrantTypeData, required_param};
use crate::endpoint::EndpointRequest;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::issuer::TokenIssuer;
use crate::model::{AuthCode, AuthCodeId, Token};
use crate::pkce::PkceMethodManager;
use crate::repository::AuthCodeRepository;

/// `authorization_code` (RFC 6749 §4.1.3, RFC 7636 §4.5)
pub struct AuthorizationCodeGrantType {
    auth_codes: Arc<dyn AuthCodeRepository>,
    issuer: Arc<TokenIssuer>,
    pkce_methods: Arc<PkceMethodManager>,
}

impl std::fmt::Debug for AuthorizationCodeGrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationCodeGrantType")
            .field("pkce_methods", &self.pkce_methods.names())
            .finish_non_exhaustive()
    }
}

impl AuthorizationCodeGrantType {
    /// Create the grant type
    pub fn new(
        auth_codes: Arc<dyn AuthCodeRepository>,
        issuer: Arc<TokenIssuer>,
        pkce_methods: Arc<PkceMethodManager>,
    ) -> Self {
        Self {
            auth_codes,
            issuer,
            pkce_methods,
        }
    }

    fn check_code(code: &AuthCode, request: &EndpointRequest) -> OAuth2Result<()> {
        if code.is_used() {
            return Err(OAuth2Error::invalid_grant(
                "The authorization code has already been used.",
            ));
        }
        if code.is_revoked() || code.has_expired() {
            return Err(OAuth2Error::invalid_grant("The authorization code expired."));
        }
        if let Some(redirect_uri) = request.param("redirect_uri")
            && redirect_uri != code.redirect_uri()
        {
            return Err(OAuth2Error::invalid_grant(
                "The parameter \"redirect_uri\" is invalid.",
            ));
        }
        Ok(())
    }

    fn check_pkce(&self, code: &AuthCode, request: &EndpointRequest) -> OAuth2Result<()> {
        let Some(code_challenge) = code.query_parameter("code_challenge") else {
            return Ok(());
        };
        let code_verifier = request.non_empty_param("code_verifier").ok_or_else(|| {
            OAuth2Error::invalid_grant("The parameter \"code_verifier\" is missing.")
        })?;
        let method = self
            .pkce_methods
            .get(code.query_parameter("code_challenge_method").unwrap_or("plain"))?;
        if !method.is_challenge_verified(code_verifier, code_challenge) {
            return Err(OAuth2Error::invalid_grant(
                "The parameter \"code_verifier\" is invalid.",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl GrantType for AuthorizationCodeGrantType {
    fn grant_type(&self) -> &str {
        "authorization_code"
    }

    fn check_token_request(&self, request: &EndpointRequest) -> OAuth2Result<()> {
        required_param(request, "code").map(|_| ())
    }

    async fn prepare_token_response(
        &self,
        request: &EndpointRequest,
        mut data: GrantTypeData,
    ) -> OAuth2Result<GrantTypeData> {
        let id = AuthCodeId::new(required_param(request, "code")?);
        let code = match self.auth_codes.find(&id).await? {
            Some(code) if code.client_id() == &data.client.id => code,
            Some(_) => {
                warn!(client_id = %data.client.id, "Authorization code presented by another client");
                return Err(OAuth2Error::invalid_grant("Code does not exist or is invalid."));
            }
            None => return Err(OAuth2Error::invalid_grant("Code does not exist or is invalid.")),
        };
        Self::check_code(&code, request)?;
        self.check_pkce(&code, request)?;

        data.resource_owner_id = code.resource_owner_id().clone();
        data.available_scopes = Some(code.scopes().to_vec());
        data.scopes = code.scopes().to_vec();
        data.issue_refresh_token = code.issue_refresh_token();
        data.auth_code = Some(code);
        Ok(data)
    }

    async fn grant(&self, data: &mut GrantTypeData) -> OAuth2Result<()> {
        let Some(code) = &data.auth_code else {
            return Err(OAuth2Error::internal("No authorization code to redeem."));
        };
        let redeemed = self.issuer.redeem_auth_code(code.id()).await?;
        data.auth_code = Some(redeemed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::event::RecordingEventPublisher;
    use crate::issuer::TokenRequest;
    use crate::issuer::testing::issuer;
    use crate::memory::InMemoryStore;
    use crate::model::{Client, ResourceOwnerId, TokenCore, UserAccountId};

    struct Fixture {
        grant: AuthorizationCodeGrantType,
        issuer: Arc<TokenIssuer>,
        client: Client,
    }

    fn fixture(store: &InMemoryStore) -> Fixture {
        let events = RecordingEventPublisher::new();
        let issuer = Arc::new(issuer(store, &events));
        Fixture {
            grant: AuthorizationCodeGrantType::new(
                store.auth_codes.clone(),
                issuer.clone(),
                Arc::new(PkceMethodManager::with_default_methods()),
            ),
            issuer,
            client: Client::new("public-app", "none"),
        }
    }

    async fn code(fixture: &Fixture, query: &[(&str, &str)]) -> AuthCode {
        let request = TokenRequest::new(
            ResourceOwnerId::from(UserAccountId::new("alice")),
            fixture.client.id.clone(),
        )
        .with_scopes(vec!["openid".to_string(), "profile".to_string()]);
        let query: BTreeMap<String, String> = query
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        fixture
            .issuer
            .create_auth_code(&request, query, "https://app.example/cb", true)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_plain_pkce_exchange() {
        // GIVEN a code issued with a plain challenge
        let store = InMemoryStore::new();
        let fixture = fixture(&store);
        let code = code(&fixture, &[("code_challenge", "abc"), ("code_challenge_method", "plain")]).await;
        let request = EndpointRequest::post(&[
            ("code", code.id().as_str()),
            ("redirect_uri", "https://app.example/cb"),
            ("code_verifier", "abc"),
        ]);

        // WHEN preparing then granting
        let mut data = fixture
            .grant
            .prepare_token_response(&request, GrantTypeData::new(fixture.client.clone()))
            .await
            .unwrap();
        fixture.grant.grant(&mut data).await.unwrap();

        // THEN the grant carries the code owner, scopes and refresh flag
        assert_eq!(data.resource_owner_id.as_str(), "alice");
        assert_eq!(data.scopes, vec!["openid".to_string(), "profile".to_string()]);
        assert!(data.issue_refresh_token);
        assert!(data.auth_code.unwrap().is_used());
    }

    #[tokio::test]
    async fn test_redirect_uri_mismatch() {
        let store = InMemoryStore::new();
        let fixture = fixture(&store);
        let code = code(&fixture, &[]).await;
        let request = EndpointRequest::post(&[
            ("code", code.id().as_str()),
            ("redirect_uri", "https://evil.example/cb"),
        ]);

        let err = fixture
            .grant
            .prepare_token_response(&request, GrantTypeData::new(fixture.client.clone()))
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidGrant);
    }

    #[tokio::test]
    async fn test_wrong_or_missing_verifier() {
        let store = InMemoryStore::new();
        let fixture = fixture(&store);
        let code = code(&fixture, &[("code_challenge", "abc")]).await;

        for request in [
            EndpointRequest::post(&[("code", code.id().as_str()), ("code_verifier", "abd")]),
            EndpointRequest::post(&[("code", code.id().as_str())]),
        ] {
            let err = fixture
                .grant
                .prepare_token_response(&request, GrantTypeData::new(fixture.client.clone()))
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidGrant);
        }
    }

    #[tokio::test]
    async fn test_code_of_another_client() {
        let store = InMemoryStore::new();
        let fixture = fixture(&store);
        let code = code(&fixture, &[]).await;
        let request = EndpointRequest::post(&[("code", code.id().as_str())]);

        let err = fixture
            .grant
            .prepare_token_response(
                &request,
                GrantTypeData::new(Client::new("other", "none")),
            )
            .await
            .unwrap_err();

        assert_eq!(err.description.as_deref(), Some("Code does not exist or is invalid."));
    }

    #[tokio::test]
    async fn test_second_grant_fails() {
        let store = InMemoryStore::new();
        let fixture = fixture(&store);
        let code = code(&fixture, &[]).await;
        let request = EndpointRequest::post(&[("code", code.id().as_str())]);

        let mut first = fixture
            .grant
            .prepare_token_response(&request, GrantTypeData::new(fixture.client.clone()))
            .await
            .unwrap();
        let mut second = first.clone();
        fixture.grant.grant(&mut first).await.unwrap();

        let err = fixture.grant.grant(&mut second).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGrant);

        let err = fixture
            .grant
            .prepare_token_response(&request, GrantTypeData::new(fixture.client.clone()))
            .await
            .unwrap_err();
        assert_eq!(
            err.description.as_deref(),
            Some("The authorization code has already been used.")
        );
    }

    #[tokio::test]
    async fn test_code_expiring_before_grant_is_not_redeemed() {
        // GIVEN a request that passed validation
        let store = InMemoryStore::new();
        let fixture = fixture(&store);
        let code = code(&fixture, &[]).await;
        let request = EndpointRequest::post(&[("code", code.id().as_str())]);
        let mut data = fixture
            .grant
            .prepare_token_response(&request, GrantTypeData::new(fixture.client.clone()))
            .await
            .unwrap();

        // WHEN the code expires before it is consumed
        let core = TokenCore::new(
            code.resource_owner_id().clone(),
            code.client_id().clone(),
            chrono::Utc::now() - chrono::Duration::seconds(1),
        );
        let expired =
            AuthCode::create(code.id().clone(), core, BTreeMap::new(), "https://app.example/cb", true);
        store.auth_codes.save(&expired).await.unwrap();

        // THEN the grant fails and the code stays unused
        let err = fixture.grant.grant(&mut data).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGrant);
        assert!(!store.auth_codes.find(code.id()).await.unwrap().unwrap().is_used());
    }
}
