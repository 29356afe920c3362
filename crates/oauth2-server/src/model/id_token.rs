use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{IdTokenId, Token, TokenCore};
use crate::event::{PendingEvents, RecordsEvents, TokenEvent};

/// ID Token entity (OpenID Connect Core §2)
///
/// The id is the signed compact JWS; `claims` is its decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdToken {
    id: IdTokenId,
    #[serde(flatten)]
    core: TokenCore,
    claims: Map<String, Value>,
    #[serde(skip)]
    events: PendingEvents,
}

impl IdToken {
    /// Create a new ID Token, recording [`TokenEvent::IdTokenCreated`]
    pub fn create(id: IdTokenId, core: TokenCore, claims: Map<String, Value>) -> Self {
        let mut events = PendingEvents::default();
        events.record(TokenEvent::IdTokenCreated {
            id_token_id: id.clone(),
            resource_owner_id: core.resource_owner_id.clone(),
            client_id: core.client_id.clone(),
            expires_at: core.expires_at,
        });
        Self {
            id,
            core,
            claims,
            events,
        }
    }

    /// Token id (the compact JWS)
    #[must_use]
    pub fn id(&self) -> &IdTokenId {
        &self.id
    }

    /// Payload claims
    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// `nonce` claim
    #[must_use]
    pub fn nonce(&self) -> Option<&str> {
        self.claim_str("nonce")
    }

    /// `at_hash` claim
    #[must_use]
    pub fn access_token_hash(&self) -> Option<&str> {
        self.claim_str("at_hash")
    }

    /// `c_hash` claim
    #[must_use]
    pub fn authorization_code_hash(&self) -> Option<&str> {
        self.claim_str("c_hash")
    }

    fn claim_str(&self, name: &str) -> Option<&str> {
        self.claims.get(name).and_then(Value::as_str)
    }

    /// Copy marked revoked, recording [`TokenEvent::IdTokenRevoked`]
    #[must_use]
    pub fn revoked(&self) -> Self {
        let mut token = self.clone();
        token.core.revoked = true;
        token.events.record(TokenEvent::IdTokenRevoked {
            id_token_id: self.id.clone(),
        });
        token
    }
}

impl RecordsEvents for IdToken {
    fn take_events(&mut self) -> Vec<TokenEvent> {
        self.events.drain()
    }
}

impl Token for IdToken {
    fn core(&self) -> &TokenCore {
        &self.core
    }

    fn token_id(&self) -> &str {
        self.id.as_str()
    }
}
