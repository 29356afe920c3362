use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{GrantType, GrantTypeData, required_param};
use crate::endpoint::EndpointRequest;
use crate::error::{OAuth2Error, OAuth2Result};
use crate::issuer::TokenIssuer;
use crate::model::{RefreshTokenId, Token};
use crate::repository::RefreshTokenRepository;

/// `refresh_token` (RFC 6749 §6)
///
/// The new access token is linked to the presented refresh token. With
/// rotation the presented token is revoked and a new one is issued with
/// the same scopes.
pub struct RefreshTokenGrantType {
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    issuer: Arc<TokenIssuer>,
    rotation: bool,
}

impl std::fmt::Debug for RefreshTokenGrantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenGrantType")
            .field("rotation", &self.rotation)
            .finish_non_exhaustive()
    }
}

impl RefreshTokenGrantType {
    /// Create the grant type without rotation
    pub fn new(refresh_tokens: Arc<dyn RefreshTokenRepository>, issuer: Arc<TokenIssuer>) -> Self {
        Self {
            refresh_tokens,
            issuer,
            rotation: false,
        }
    }

    /// Revoke the presented refresh token and issue a new one
    #[must_use]
    pub fn with_rotation(mut self, rotation: bool) -> Self {
        self.rotation = rotation;
        self
    }
}

#[async_trait]
impl GrantType for RefreshTokenGrantType {
    fn grant_type(&self) -> &str {
        "refresh_token"
    }

    fn check_token_request(&self, request: &EndpointRequest) -> OAuth2Result<()> {
        required_param(request, "refresh_token").map(|_| ())
    }

    async fn prepare_token_response(
        &self,
        request: &EndpointRequest,
        mut data: GrantTypeData,
    ) -> OAuth2Result<GrantTypeData> {
        let id = RefreshTokenId::new(required_param(request, "refresh_token")?);
        let token = match self.refresh_tokens.find(&id).await? {
            Some(token) if token.client_id() == &data.client.id => token,
            Some(_) => {
                warn!(client_id = %data.client.id, "Refresh token presented by another client");
                return Err(OAuth2Error::invalid_grant(
                    "Refresh token does not exist or is invalid.",
                ));
            }
            None => {
                return Err(OAuth2Error::invalid_grant(
                    "Refresh token does not exist or is invalid.",
                ));
            }
        };
        if !token.is_active() {
            return Err(OAuth2Error::invalid_grant("Refresh token has expired."));
        }

        data.resource_owner_id = token.resource_owner_id().clone();
        data.available_scopes = Some(token.scopes().to_vec());
        data.scopes = token.scopes().to_vec();
        data.refresh_token = Some(token);
        Ok(data)
    }

    async fn grant(&self, data: &mut GrantTypeData) -> OAuth2Result<()> {
        if !self.rotation {
            return Ok(());
        }
        let Some(token) = data.refresh_token.take() else {
            return Err(OAuth2Error::internal("No refresh token to rotate."));
        };
        // Fails for every request but the first that rotates this token
        self.issuer.rotate_refresh_token(token.id()).await?;
        debug!(client_id = %data.client.id, "Refresh token rotated");
        data.issue_refresh_token = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::error::ErrorCode;
    use crate::event::RecordingEventPublisher;
    use crate::issuer::TokenRequest;
    use crate::issuer::testing::issuer;
    use crate::memory::InMemoryStore;
    use crate::model::{Client, RefreshToken, ResourceOwnerId, UserAccountId};

    async fn refresh_token(issuer: &TokenIssuer) -> RefreshToken {
        let request = TokenRequest::new(
            ResourceOwnerId::from(UserAccountId::new("alice")),
            "web".into(),
        )
        .with_scopes(vec!["read".to_string(), "write".to_string()]);
        issuer.create_refresh_token(&request).await.unwrap()
    }

    #[tokio::test]
    async fn test_refresh_offers_original_scopes() {
        // GIVEN a refresh token of client "web"
        let store = InMemoryStore::new();
        let events = RecordingEventPublisher::new();
        let issuer = Arc::new(issuer(&store, &events));
        let token = refresh_token(&issuer).await;
        let grant = RefreshTokenGrantType::new(store.refresh_tokens.clone(), issuer);

        // WHEN exchanging it
        let request = EndpointRequest::post(&[("refresh_token", token.id().as_str())]);
        let mut data = grant
            .prepare_token_response(&request, GrantTypeData::new(Client::new("web", "client_secret_basic")))
            .await
            .unwrap();
        grant.grant(&mut data).await.unwrap();

        // THEN the original scopes are available and the token is reused
        assert_eq!(data.available_scopes, Some(vec!["read".to_string(), "write".to_string()]));
        assert_eq!(data.refresh_token.map(|t| t.id().clone()), Some(token.id().clone()));
        assert!(!data.issue_refresh_token);
    }

    #[tokio::test]
    async fn test_rotation_revokes_presented_token() {
        let store = InMemoryStore::new();
        let events = RecordingEventPublisher::new();
        let issuer = Arc::new(issuer(&store, &events));
        let token = refresh_token(&issuer).await;
        let grant =
            RefreshTokenGrantType::new(store.refresh_tokens.clone(), issuer).with_rotation(true);

        let request = EndpointRequest::post(&[("refresh_token", token.id().as_str())]);
        let mut data = grant
            .prepare_token_response(&request, GrantTypeData::new(Client::new("web", "client_secret_basic")))
            .await
            .unwrap();
        grant.grant(&mut data).await.unwrap();

        assert!(data.issue_refresh_token);
        assert!(data.refresh_token.is_none());
        let stored = store.refresh_tokens.find(token.id()).await.unwrap().unwrap();
        assert!(stored.is_revoked());

        let err = grant
            .prepare_token_response(&request, GrantTypeData::new(Client::new("web", "client_secret_basic")))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidGrant);
    }

    #[tokio::test]
    async fn test_refresh_token_of_another_client() {
        let store = InMemoryStore::new();
        let events = RecordingEventPublisher::new();
        let issuer = Arc::new(issuer(&store, &events));
        let token = refresh_token(&issuer).await;
        let grant = RefreshTokenGrantType::new(store.refresh_tokens.clone(), issuer);

        let request = EndpointRequest::post(&[("refresh_token", token.id().as_str())]);
        let err = grant
            .prepare_token_response(&request, GrantTypeData::new(Client::new("other", "client_secret_basic")))
            .await
            .unwrap_err();

        assert_eq!(
            err.description.as_deref(),
            Some("Refresh token does not exist or is invalid.")
        );
    }
}
