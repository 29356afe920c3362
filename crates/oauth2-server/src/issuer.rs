//! Token issuance
//!
//! [`TokenIssuer`] is the only place where token entities are created: it
//! generates the identifier, builds the entity through its factory, saves it,
//! then publishes the events the entity recorded.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{OAuth2Error, OAuth2Result};
use crate::event::{EventPublisher, RecordsEvents, publish_all};
use crate::model::{
    AccessToken, AccessTokenId, AuthCode, AuthCodeId, ClientId, DataBag, InitialAccessToken,
    InitialAccessTokenId, RefreshToken, RefreshTokenId, ResourceOwnerId, Token, TokenCore,
    UserAccountId,
};
use crate::repository::{
    AccessTokenRepository, AuthCodeRepository, InitialAccessTokenRepository, RefreshTokenRepository,
};
use crate::token_id::{TokenIdContext, TokenIdGenerator, TokenKind};

/// Token lifetimes in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    /// Access tokens
    pub access_token: u64,
    /// Refresh tokens
    pub refresh_token: u64,
    /// Authorization codes
    pub auth_code: u64,
}

/// What to put in a new token
#[derive(Debug, Clone)]
pub struct TokenRequest {
    /// Owner
    pub resource_owner_id: ResourceOwnerId,
    /// Client
    pub client_id: ClientId,
    /// Granted scopes
    pub scopes: Vec<String>,
    /// Client-visible parameters
    pub parameters: DataBag,
    /// Server-side metadatas
    pub metadatas: DataBag,
}

impl TokenRequest {
    /// Request without scopes, parameters or metadatas
    pub fn new(resource_owner_id: ResourceOwnerId, client_id: ClientId) -> Self {
        Self {
            resource_owner_id,
            client_id,
            scopes: Vec::new(),
            parameters: DataBag::new(),
            metadatas: DataBag::new(),
        }
    }

    /// Set the granted scopes
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: DataBag) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the metadatas
    #[must_use]
    pub fn with_metadatas(mut self, metadatas: DataBag) -> Self {
        self.metadatas = metadatas;
        self
    }

    fn core(&self, expires_at: DateTime<Utc>) -> TokenCore {
        TokenCore::new(
            self.resource_owner_id.clone(),
            self.client_id.clone(),
            expires_at,
        )
        .with_scopes(self.scopes.clone())
        .with_parameters(self.parameters.clone())
        .with_metadatas(self.metadatas.clone())
    }
}

/// Creates and persists tokens
pub struct TokenIssuer {
    access_tokens: Arc<dyn AccessTokenRepository>,
    refresh_tokens: Arc<dyn RefreshTokenRepository>,
    auth_codes: Arc<dyn AuthCodeRepository>,
    initial_access_tokens: Arc<dyn InitialAccessTokenRepository>,
    access_token_ids: Arc<dyn TokenIdGenerator>,
    token_ids: Arc<dyn TokenIdGenerator>,
    events: Arc<dyn EventPublisher>,
    lifetimes: TokenLifetimes,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("lifetimes", &self.lifetimes)
            .field("access_token_ids", &self.access_token_ids)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Create an issuer
    ///
    /// `token_ids` generates every identifier; access token identifiers can
    /// be overridden with [`with_access_token_ids`](Self::with_access_token_ids).
    pub fn new(
        access_tokens: Arc<dyn AccessTokenRepository>,
        refresh_tokens: Arc<dyn RefreshTokenRepository>,
        auth_codes: Arc<dyn AuthCodeRepository>,
        initial_access_tokens: Arc<dyn InitialAccessTokenRepository>,
        token_ids: Arc<dyn TokenIdGenerator>,
        events: Arc<dyn EventPublisher>,
        lifetimes: TokenLifetimes,
    ) -> Self {
        Self {
            access_tokens,
            refresh_tokens,
            auth_codes,
            initial_access_tokens,
            access_token_ids: token_ids.clone(),
            token_ids,
            events,
            lifetimes,
        }
    }

    /// Use a dedicated generator for access token identifiers (JWT access tokens)
    #[must_use]
    pub fn with_access_token_ids(mut self, generator: Arc<dyn TokenIdGenerator>) -> Self {
        self.access_token_ids = generator;
        self
    }

    /// The event sink
    pub fn events(&self) -> &Arc<dyn EventPublisher> {
        &self.events
    }

    /// Issue an access token, optionally paired with a refresh token
    ///
    /// The refresh token must be valid at issuance in storage, not only in
    /// the caller's copy. The new access token is linked to it in the same
    /// step so that revocation can cascade.
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` for an expired or revoked refresh token and
    /// storage errors as they occur.
    pub async fn create_access_token(
        &self,
        request: &TokenRequest,
        refresh_token: Option<&RefreshToken>,
    ) -> OAuth2Result<AccessToken> {
        let expires_at = TokenCore::expires_in_seconds(self.lifetimes.access_token);
        let id = self.access_token_ids.generate(&TokenIdContext {
            kind: TokenKind::AccessToken,
            client_id: &request.client_id,
            resource_owner_id: &request.resource_owner_id,
            scopes: &request.scopes,
            expires_at,
        })?;

        let mut token = AccessToken::create(
            AccessTokenId::new(id),
            request.core(expires_at),
            refresh_token.map(|rt| rt.id().clone()),
        );

        let linked = match refresh_token {
            Some(refresh_token) => Some(
                self.refresh_tokens
                    .add_access_token(refresh_token.id(), token.id())
                    .await?
                    .ok_or_else(|| {
                        OAuth2Error::invalid_grant("The refresh token is expired or revoked.")
                    })?,
            ),
            None => None,
        };

        self.access_tokens.save(&token).await?;
        publish_all(self.events.as_ref(), token.take_events());
        if let Some(mut linked) = linked {
            publish_all(self.events.as_ref(), linked.take_events());
        }

        debug!(
            client_id = %request.client_id,
            scope = %request.scopes.join(" "),
            refresh_token = refresh_token.is_some(),
            "Access token issued"
        );
        Ok(token)
    }

    /// Issue a refresh token
    ///
    /// # Errors
    ///
    /// Returns storage errors as they occur.
    pub async fn create_refresh_token(&self, request: &TokenRequest) -> OAuth2Result<RefreshToken> {
        let expires_at = TokenCore::expires_in_seconds(self.lifetimes.refresh_token);
        let id = self.token_ids.generate(&TokenIdContext {
            kind: TokenKind::RefreshToken,
            client_id: &request.client_id,
            resource_owner_id: &request.resource_owner_id,
            scopes: &request.scopes,
            expires_at,
        })?;

        let mut token = RefreshToken::create(RefreshTokenId::new(id), request.core(expires_at));
        self.refresh_tokens.save(&token).await?;
        publish_all(self.events.as_ref(), token.take_events());
        Ok(token)
    }

    /// Issue an authorization code
    ///
    /// # Errors
    ///
    /// Returns storage errors as they occur.
    pub async fn create_auth_code(
        &self,
        request: &TokenRequest,
        query_parameters: BTreeMap<String, String>,
        redirect_uri: &str,
        issue_refresh_token: bool,
    ) -> OAuth2Result<AuthCode> {
        let expires_at = TokenCore::expires_in_seconds(self.lifetimes.auth_code);
        let id = self.token_ids.generate(&TokenIdContext {
            kind: TokenKind::AuthCode,
            client_id: &request.client_id,
            resource_owner_id: &request.resource_owner_id,
            scopes: &request.scopes,
            expires_at,
        })?;

        let mut code = AuthCode::create(
            AuthCodeId::new(id),
            request.core(expires_at),
            query_parameters,
            redirect_uri,
            issue_refresh_token,
        );
        self.auth_codes.save(&code).await?;
        publish_all(self.events.as_ref(), code.take_events());
        Ok(code)
    }

    /// Issue an initial access token for dynamic client registration
    ///
    /// # Errors
    ///
    /// Returns storage errors as they occur.
    pub async fn create_initial_access_token(
        &self,
        user_account_id: UserAccountId,
        expires_at: Option<DateTime<Utc>>,
    ) -> OAuth2Result<InitialAccessToken> {
        let owner = ResourceOwnerId::UserAccount(user_account_id.clone());
        let client_id = ClientId::new("");
        let id = self.token_ids.generate(&TokenIdContext {
            kind: TokenKind::InitialAccessToken,
            client_id: &client_id,
            resource_owner_id: &owner,
            scopes: &[],
            expires_at: expires_at.unwrap_or(DateTime::<Utc>::MAX_UTC),
        })?;

        let mut token =
            InitialAccessToken::create(InitialAccessTokenId::new(id), user_account_id, expires_at);
        self.initial_access_tokens.save(&token).await?;
        publish_all(self.events.as_ref(), token.take_events());
        Ok(token)
    }

    /// Atomically redeem an authorization code
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` when the code is unknown, already used, revoked
    /// or expired, and storage errors as they occur.
    pub async fn redeem_auth_code(&self, id: &AuthCodeId) -> OAuth2Result<AuthCode> {
        let mut code = self.auth_codes.mark_as_used(id).await?.ok_or_else(|| {
            OAuth2Error::invalid_grant("The authorization code is expired or has already been used.")
        })?;
        publish_all(self.events.as_ref(), code.take_events());
        Ok(code)
    }

    /// Revoke an access token; unknown ids are ignored
    ///
    /// # Errors
    ///
    /// Returns storage errors as they occur.
    pub async fn revoke_access_token(&self, id: &AccessTokenId) -> OAuth2Result<()> {
        if let Some(mut token) = self.access_tokens.revoke(id).await? {
            publish_all(self.events.as_ref(), token.take_events());
        }
        Ok(())
    }

    /// Revoke a refresh token; unknown ids are ignored
    ///
    /// # Errors
    ///
    /// Returns storage errors as they occur.
    pub async fn revoke_refresh_token(&self, id: &RefreshTokenId) -> OAuth2Result<Option<RefreshToken>> {
        let revoked = self.refresh_tokens.revoke(id).await?;
        if let Some(mut token) = revoked.clone() {
            publish_all(self.events.as_ref(), token.take_events());
        }
        Ok(revoked)
    }

    /// Revoke a refresh token being exchanged for a new one
    ///
    /// # Errors
    ///
    /// Returns `invalid_grant` when the token was already revoked (a replay
    /// or a concurrent rotation) or has expired, and storage errors as they
    /// occur.
    pub async fn rotate_refresh_token(&self, id: &RefreshTokenId) -> OAuth2Result<RefreshToken> {
        let mut token = self.refresh_tokens.revoke_if_active(id).await?.ok_or_else(|| {
            OAuth2Error::invalid_grant("Refresh token does not exist or is invalid.")
        })?;
        publish_all(self.events.as_ref(), token.take_events());
        Ok(token)
    }

    /// Revoke an authorization code; unknown ids are ignored
    ///
    /// # Errors
    ///
    /// Returns storage errors as they occur.
    pub async fn revoke_auth_code(&self, id: &AuthCodeId) -> OAuth2Result<()> {
        if let Some(mut code) = self.auth_codes.revoke(id).await? {
            publish_all(self.events.as_ref(), code.take_events());
        }
        Ok(())
    }
}
