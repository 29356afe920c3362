use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{ClientId, DataBag, ResourceOwnerId};

/// Fields shared by every token entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenCore {
    /// Owner of the token
    pub resource_owner_id: ResourceOwnerId,
    /// Client the token was issued to
    pub client_id: ClientId,
    /// Granted scopes
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Values returned to the client with the token
    #[serde(default)]
    pub parameters: DataBag,
    /// Server-side values
    #[serde(default)]
    pub metadatas: DataBag,
    /// Absolute expiry instant
    pub expires_at: DateTime<Utc>,
    /// Whether the token was revoked
    #[serde(default)]
    pub revoked: bool,
}

impl TokenCore {
    /// Create the shared part of a token
    pub fn new(
        resource_owner_id: ResourceOwnerId,
        client_id: ClientId,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_owner_id,
            client_id,
            scopes: Vec::new(),
            parameters: DataBag::new(),
            metadatas: DataBag::new(),
            expires_at,
            revoked: false,
        }
    }

    /// Expiry computed from a lifetime in seconds
    #[must_use]
    pub fn expires_in_seconds(lifetime: u64) -> DateTime<Utc> {
        i64::try_from(lifetime)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Set the granted scopes
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Set the client-visible parameters
    #[must_use]
    pub fn with_parameters(mut self, parameters: DataBag) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the server-side metadatas
    #[must_use]
    pub fn with_metadatas(mut self, metadatas: DataBag) -> Self {
        self.metadatas = metadatas;
        self
    }
}

/// Behaviour shared by token entities
pub trait Token {
    /// The shared token fields
    fn core(&self) -> &TokenCore;

    /// Raw token identifier
    fn token_id(&self) -> &str;

    /// Client the token was issued to
    fn client_id(&self) -> &ClientId {
        &self.core().client_id
    }

    /// Owner of the token
    fn resource_owner_id(&self) -> &ResourceOwnerId {
        &self.core().resource_owner_id
    }

    /// Granted scopes
    fn scopes(&self) -> &[String] {
        &self.core().scopes
    }

    /// Whether `scope` was granted
    fn has_scope(&self, scope: &str) -> bool {
        self.core().scopes.iter().any(|s| s == scope)
    }

    /// Client-visible parameters
    fn parameters(&self) -> &DataBag {
        &self.core().parameters
    }

    /// Server-side metadatas
    fn metadatas(&self) -> &DataBag {
        &self.core().metadatas
    }

    /// Absolute expiry instant
    fn expires_at(&self) -> DateTime<Utc> {
        self.core().expires_at
    }

    /// Whether the token was revoked
    fn is_revoked(&self) -> bool {
        self.core().revoked
    }

    /// Whether the token is expired at `now`
    fn has_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.core().expires_at
    }

    /// Whether the token is expired
    fn has_expired(&self) -> bool {
        self.has_expired_at(Utc::now())
    }

    /// Seconds remaining at `now`, never negative
    fn expires_in_at(&self, now: DateTime<Utc>) -> u64 {
        let remaining = (self.core().expires_at - now).num_seconds();
        u64::try_from(remaining).unwrap_or(0)
    }

    /// Seconds remaining, never negative
    fn expires_in(&self) -> u64 {
        self.expires_in_at(Utc::now())
    }

    /// Neither expired nor revoked
    fn is_active(&self) -> bool {
        !self.is_revoked() && !self.has_expired()
    }
}
