//! Storage contracts for clients, user accounts and tokens
//!
//! Implementations must be safe for concurrent use. Entities are created by
//! their `create` factories through [`crate::issuer::TokenIssuer`]; the
//! repositories only persist and look them up. Revocation is a state
//! transition: revoked tokens stay findable so that introspection can report
//! them inactive.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::OAuth2Result;
use crate::model::{
    AccessToken, AccessTokenId, AuthCode, AuthCodeId, Client, ClientId, IdToken, IdTokenId,
    InitialAccessToken, InitialAccessTokenId, RefreshToken, RefreshTokenId, UserAccount,
    UserAccountId,
};

/// Registered clients
#[async_trait]
pub trait ClientRepository: Send + Sync {
    /// Find a client
    async fn find(&self, id: &ClientId) -> OAuth2Result<Option<Client>>;

    /// Whether the client exists
    async fn has(&self, id: &ClientId) -> OAuth2Result<bool> {
        Ok(self.find(id).await?.is_some())
    }
}

/// End-user accounts
#[async_trait]
pub trait UserAccountRepository: Send + Sync {
    /// Find an account
    async fn find(&self, id: &UserAccountId) -> OAuth2Result<Option<UserAccount>>;
}

/// Access tokens
#[async_trait]
pub trait AccessTokenRepository: Send + Sync {
    /// Insert or replace a token
    async fn save(&self, token: &AccessToken) -> OAuth2Result<()>;

    /// Find a token, revoked ones included
    async fn find(&self, id: &AccessTokenId) -> OAuth2Result<Option<AccessToken>>;

    /// Whether the token exists
    async fn has(&self, id: &AccessTokenId) -> OAuth2Result<bool> {
        Ok(self.find(id).await?.is_some())
    }

    /// Mark a token revoked; returns the revoked token, `None` if unknown
    async fn revoke(&self, id: &AccessTokenId) -> OAuth2Result<Option<AccessToken>>;
}

/// Refresh tokens
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Insert or replace a token
    async fn save(&self, token: &RefreshToken) -> OAuth2Result<()>;

    /// Find a token, revoked ones included
    async fn find(&self, id: &RefreshTokenId) -> OAuth2Result<Option<RefreshToken>>;

    /// Whether the token exists
    async fn has(&self, id: &RefreshTokenId) -> OAuth2Result<bool> {
        Ok(self.find(id).await?.is_some())
    }

    /// Mark a token revoked; returns the revoked token, `None` if unknown
    async fn revoke(&self, id: &RefreshTokenId) -> OAuth2Result<Option<RefreshToken>>;

    /// Atomically link an access token to an active refresh token
    ///
    /// Returns the updated token, or `None` when the token is unknown,
    /// revoked or expired. The check and the write happen as one step, so a
    /// concurrent revocation is never overwritten and concurrent links never
    /// drop each other's access tokens.
    async fn add_access_token(
        &self,
        id: &RefreshTokenId,
        access_token_id: &AccessTokenId,
    ) -> OAuth2Result<Option<RefreshToken>>;

    /// Atomically revoke a token that is still active
    ///
    /// Returns the revoked token when this call performed the transition and
    /// `None` when the token is unknown, already revoked or expired. Of any
    /// number of concurrent calls for the same id at most one may succeed,
    /// which keeps a rotated refresh token single-use.
    async fn revoke_if_active(&self, id: &RefreshTokenId) -> OAuth2Result<Option<RefreshToken>>;
}

/// Authorization codes
#[async_trait]
pub trait AuthCodeRepository: Send + Sync {
    /// Insert or replace a code
    async fn save(&self, code: &AuthCode) -> OAuth2Result<()>;

    /// Find a code, used and revoked ones included
    async fn find(&self, id: &AuthCodeId) -> OAuth2Result<Option<AuthCode>>;

    /// Whether the code exists
    async fn has(&self, id: &AuthCodeId) -> OAuth2Result<bool> {
        Ok(self.find(id).await?.is_some())
    }

    /// Mark a code revoked; returns the revoked code, `None` if unknown
    async fn revoke(&self, id: &AuthCodeId) -> OAuth2Result<Option<AuthCode>>;

    /// Atomically mark an unused code as used
    ///
    /// Returns the used code when this call performed the transition and
    /// `None` when the code is unknown, revoked, expired or already used. Of any number
    /// of concurrent calls for the same id at most one may succeed; this is
    /// the single-use guarantee of RFC 6749 §4.1.2.
    async fn mark_as_used(&self, id: &AuthCodeId) -> OAuth2Result<Option<AuthCode>>;
}

/// ID Tokens
#[async_trait]
pub trait IdTokenRepository: Send + Sync {
    /// Insert or replace a token
    async fn save(&self, token: &IdToken) -> OAuth2Result<()>;

    /// Find a token
    async fn find(&self, id: &IdTokenId) -> OAuth2Result<Option<IdToken>>;

    /// Mark a token revoked; returns the revoked token, `None` if unknown
    async fn revoke(&self, id: &IdTokenId) -> OAuth2Result<Option<IdToken>>;
}

/// Initial access tokens
#[async_trait]
pub trait InitialAccessTokenRepository: Send + Sync {
    /// Insert or replace a token
    async fn save(&self, token: &InitialAccessToken) -> OAuth2Result<()>;

    /// Find a token
    async fn find(&self, id: &InitialAccessTokenId) -> OAuth2Result<Option<InitialAccessToken>>;

    /// Mark a token revoked; returns the revoked token, `None` if unknown
    async fn revoke(&self, id: &InitialAccessTokenId) -> OAuth2Result<Option<InitialAccessToken>>;
}

/// Every repository the server needs
#[derive(Clone)]
pub struct Repositories {
    /// Clients
    pub clients: Arc<dyn ClientRepository>,
    /// User accounts
    pub user_accounts: Arc<dyn UserAccountRepository>,
    /// Access tokens
    pub access_tokens: Arc<dyn AccessTokenRepository>,
    /// Refresh tokens
    pub refresh_tokens: Arc<dyn RefreshTokenRepository>,
    /// Authorization codes
    pub auth_codes: Arc<dyn AuthCodeRepository>,
    /// ID Tokens
    pub id_tokens: Arc<dyn IdTokenRepository>,
    /// Initial access tokens
    pub initial_access_tokens: Arc<dyn InitialAccessTokenRepository>,
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
