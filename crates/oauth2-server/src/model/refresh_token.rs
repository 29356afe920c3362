use serde::{Deserialize, Serialize};

use super::{AccessTokenId, RefreshTokenId, Token, TokenCore};
use crate::event::{PendingEvents, RecordsEvents, TokenEvent};

/// Refresh token entity
///
/// Tracks every access token issued from it so that revocation can cascade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshToken {
    id: RefreshTokenId,
    #[serde(flatten)]
    core: TokenCore,
    #[serde(default)]
    access_token_ids: Vec<AccessTokenId>,
    #[serde(skip)]
    events: PendingEvents,
}

impl RefreshToken {
    /// Create a new refresh token, recording [`TokenEvent::RefreshTokenCreated`]
    pub fn create(id: RefreshTokenId, core: TokenCore) -> Self {
        let mut events = PendingEvents::default();
        events.record(TokenEvent::RefreshTokenCreated {
            refresh_token_id: id.clone(),
            resource_owner_id: core.resource_owner_id.clone(),
            client_id: core.client_id.clone(),
            scopes: core.scopes.clone(),
            expires_at: core.expires_at,
        });
        Self {
            id,
            core,
            access_token_ids: Vec::new(),
            events,
        }
    }

    /// Token id
    #[must_use]
    pub fn id(&self) -> &RefreshTokenId {
        &self.id
    }

    /// Access tokens issued from this refresh token
    #[must_use]
    pub fn access_token_ids(&self) -> &[AccessTokenId] {
        &self.access_token_ids
    }

    /// Copy with an access token linked; linking twice is a no-op
    #[must_use]
    pub fn with_access_token(&self, access_token_id: &AccessTokenId) -> Self {
        let mut token = self.clone();
        if !token.access_token_ids.contains(access_token_id) {
            token.access_token_ids.push(access_token_id.clone());
            token.events.record(TokenEvent::AccessTokenAddedToRefreshToken {
                refresh_token_id: self.id.clone(),
                access_token_id: access_token_id.clone(),
            });
        }
        token
    }

    /// Copy marked revoked, recording [`TokenEvent::RefreshTokenRevoked`]
    #[must_use]
    pub fn revoked(&self) -> Self {
        let mut token = self.clone();
        token.core.revoked = true;
        token.events.record(TokenEvent::RefreshTokenRevoked {
            refresh_token_id: self.id.clone(),
        });
        token
    }
}

impl RecordsEvents for RefreshToken {
    fn take_events(&mut self) -> Vec<TokenEvent> {
        self.events.drain()
    }
}

impl Token for RefreshToken {
    fn core(&self) -> &TokenCore {
        &self.core
    }

    fn token_id(&self) -> &str {
        self.id.as_str()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{ClientId, ResourceOwnerId, UserAccountId};

    #[test]
    fn test_with_access_token_is_idempotent() {
        let core = TokenCore::new(
            ResourceOwnerId::from(UserAccountId::new("alice")),
            ClientId::new("client-1"),
            Utc::now(),
        );
        let token = RefreshToken::create(RefreshTokenId::new("rt"), core);
        let at = AccessTokenId::new("at");

        let mut linked = token.with_access_token(&at).with_access_token(&at);

        assert!(token.access_token_ids().is_empty());
        assert_eq!(linked.access_token_ids(), &[at]);
        assert_eq!(linked.take_events().len(), 2);
    }
}
