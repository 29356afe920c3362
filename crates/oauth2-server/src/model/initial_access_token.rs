use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{InitialAccessTokenId, UserAccountId};
use crate::event::{PendingEvents, RecordsEvents, TokenEvent};

/// Initial access token (RFC 7591 §3), gating dynamic client registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialAccessToken {
    id: InitialAccessTokenId,
    user_account_id: UserAccountId,
    expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    revoked: bool,
    #[serde(skip)]
    events: PendingEvents,
}

impl InitialAccessToken {
    /// Create a new token, recording [`TokenEvent::InitialAccessTokenCreated`]
    pub fn create(
        id: InitialAccessTokenId,
        user_account_id: UserAccountId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut events = PendingEvents::default();
        events.record(TokenEvent::InitialAccessTokenCreated {
            initial_access_token_id: id.clone(),
            user_account_id: user_account_id.clone(),
            expires_at,
        });
        Self {
            id,
            user_account_id,
            expires_at,
            revoked: false,
            events,
        }
    }

    /// Token id
    #[must_use]
    pub fn id(&self) -> &InitialAccessTokenId {
        &self.id
    }

    /// User that created the token
    #[must_use]
    pub fn user_account_id(&self) -> &UserAccountId {
        &self.user_account_id
    }

    /// Expiry, `None` for non-expiring tokens
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Whether the token is expired; tokens without expiry never are
    #[must_use]
    pub fn has_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() > at)
    }

    /// Whether the token was revoked
    #[must_use]
    pub fn is_revoked(&self) -> bool {
        self.revoked
    }

    /// Copy marked revoked, recording [`TokenEvent::InitialAccessTokenRevoked`]
    #[must_use]
    pub fn revoked(&self) -> Self {
        let mut token = self.clone();
        token.revoked = true;
        token.events.record(TokenEvent::InitialAccessTokenRevoked {
            initial_access_token_id: self.id.clone(),
        });
        token
    }
}

impl RecordsEvents for InitialAccessToken {
    fn take_events(&mut self) -> Vec<TokenEvent> {
        self.events.drain()
    }
}
