use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{AuthCodeId, Token, TokenCore};
use crate::event::{PendingEvents, RecordsEvents, TokenEvent};

/// Authorization code entity
///
/// Keeps the authorization request query so that the token endpoint can
/// check PKCE and the OpenID Connect parameters (`nonce`, `claims`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthCode {
    id: AuthCodeId,
    #[serde(flatten)]
    core: TokenCore,
    query_parameters: BTreeMap<String, String>,
    redirect_uri: String,
    issue_refresh_token: bool,
    #[serde(default)]
    used: bool,
    #[serde(skip)]
    events: PendingEvents,
}

impl AuthCode {
    /// Create a new code, recording [`TokenEvent::AuthCodeCreated`]
    pub fn create(
        id: AuthCodeId,
        core: TokenCore,
        query_parameters: BTreeMap<String, String>,
        redirect_uri: impl Into<String>,
        issue_refresh_token: bool,
    ) -> Self {
        let redirect_uri = redirect_uri.into();
        let mut events = PendingEvents::default();
        events.record(TokenEvent::AuthCodeCreated {
            auth_code_id: id.clone(),
            resource_owner_id: core.resource_owner_id.clone(),
            client_id: core.client_id.clone(),
            scopes: core.scopes.clone(),
            redirect_uri: redirect_uri.clone(),
            expires_at: core.expires_at,
        });
        Self {
            id,
            core,
            query_parameters,
            redirect_uri,
            issue_refresh_token,
            used: false,
            events,
        }
    }

    /// Code id
    #[must_use]
    pub fn id(&self) -> &AuthCodeId {
        &self.id
    }

    /// Authorization request parameters
    #[must_use]
    pub fn query_parameters(&self) -> &BTreeMap<String, String> {
        &self.query_parameters
    }

    /// One authorization request parameter
    #[must_use]
    pub fn query_parameter(&self, key: &str) -> Option<&str> {
        self.query_parameters.get(key).map(String::as_str)
    }

    /// Redirect URI the code was delivered to
    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Whether exchanging this code also issues a refresh token
    #[must_use]
    pub fn issue_refresh_token(&self) -> bool {
        self.issue_refresh_token
    }

    /// Whether the code was already redeemed
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.used
    }

    /// Copy that issues a refresh token on exchange
    #[must_use]
    pub fn with_refresh_token(&self) -> Self {
        Self {
            issue_refresh_token: true,
            ..self.clone()
        }
    }

    /// Copy that does not issue a refresh token on exchange
    #[must_use]
    pub fn without_refresh_token(&self) -> Self {
        Self {
            issue_refresh_token: false,
            ..self.clone()
        }
    }

    /// Copy marked used, recording [`TokenEvent::AuthCodeMarkedAsUsed`]
    #[must_use]
    pub fn mark_as_used(&self) -> Self {
        let mut code = self.clone();
        code.used = true;
        code.events.record(TokenEvent::AuthCodeMarkedAsUsed {
            auth_code_id: self.id.clone(),
        });
        code
    }

    /// Copy marked revoked, recording [`TokenEvent::AuthCodeRevoked`]
    #[must_use]
    pub fn revoked(&self) -> Self {
        let mut code = self.clone();
        code.core.revoked = true;
        code.events.record(TokenEvent::AuthCodeRevoked {
            auth_code_id: self.id.clone(),
        });
        code
    }
}

impl RecordsEvents for AuthCode {
    fn take_events(&mut self) -> Vec<TokenEvent> {
        self.events.drain()
    }
}

impl Token for AuthCode {
    fn core(&self) -> &TokenCore {
        &self.core
    }

    fn token_id(&self) -> &str {
        self.id.as_str()
    }

    fn is_active(&self) -> bool {
        !self.used && !self.core.revoked && !self.has_expired()
    }
}
