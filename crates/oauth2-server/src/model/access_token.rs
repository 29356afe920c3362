use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{AccessTokenId, RefreshTokenId, Token, TokenCore, join_scopes};
use crate::event::{PendingEvents, RecordsEvents, TokenEvent};

/// Access token entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessToken {
    id: AccessTokenId,
    #[serde(flatten)]
    core: TokenCore,
    refresh_token_id: Option<RefreshTokenId>,
    #[serde(skip)]
    events: PendingEvents,
}

impl AccessToken {
    /// Create a new access token, recording [`TokenEvent::AccessTokenCreated`]
    pub fn create(
        id: AccessTokenId,
        core: TokenCore,
        refresh_token_id: Option<RefreshTokenId>,
    ) -> Self {
        let mut events = PendingEvents::default();
        events.record(TokenEvent::AccessTokenCreated {
            access_token_id: id.clone(),
            resource_owner_id: core.resource_owner_id.clone(),
            client_id: core.client_id.clone(),
            scopes: core.scopes.clone(),
            expires_at: core.expires_at,
            refresh_token_id: refresh_token_id.clone(),
        });
        Self {
            id,
            core,
            refresh_token_id,
            events,
        }
    }

    /// Token id
    #[must_use]
    pub fn id(&self) -> &AccessTokenId {
        &self.id
    }

    /// Paired refresh token
    #[must_use]
    pub fn refresh_token_id(&self) -> Option<&RefreshTokenId> {
        self.refresh_token_id.as_ref()
    }

    /// Copy with a parameter set
    #[must_use]
    pub fn with_parameter(&self, key: &str, value: impl Into<Value>) -> Self {
        let mut token = self.clone();
        token.core.parameters = self.core.parameters.with(key, value);
        token
    }

    /// Copy with a metadata set
    #[must_use]
    pub fn with_metadata(&self, key: &str, value: impl Into<Value>) -> Self {
        let mut token = self.clone();
        token.core.metadatas = self.core.metadatas.with(key, value);
        token
    }

    /// Copy marked revoked, recording [`TokenEvent::AccessTokenRevoked`]
    #[must_use]
    pub fn revoked(&self) -> Self {
        let mut token = self.clone();
        token.core.revoked = true;
        token.events.record(TokenEvent::AccessTokenRevoked {
            access_token_id: self.id.clone(),
        });
        token
    }

    /// Token response body (RFC 6749 §5.1)
    ///
    /// `access_token`, `expires_in`, `scope` when non-empty, `refresh_token`
    /// when paired, then every parameter (`token_type` included).
    #[must_use]
    pub fn response_data(&self) -> Map<String, Value> {
        let mut data = Map::new();
        data.insert("access_token".to_string(), Value::from(self.id.as_str()));
        data.insert("expires_in".to_string(), Value::from(self.expires_in()));
        if !self.core.scopes.is_empty() {
            data.insert("scope".to_string(), Value::from(join_scopes(&self.core.scopes)));
        }
        if let Some(refresh_token_id) = &self.refresh_token_id {
            data.insert("refresh_token".to_string(), Value::from(refresh_token_id.as_str()));
        }
        for (key, value) in self.core.parameters.iter() {
            data.insert(key.clone(), value.clone());
        }
        data
    }
}

impl RecordsEvents for AccessToken {
    fn take_events(&mut self) -> Vec<TokenEvent> {
        self.events.drain()
    }
}

impl Token for AccessToken {
    fn core(&self) -> &TokenCore {
        &self.core
    }

    fn token_id(&self) -> &str {
        self.id.as_str()
    }
}
