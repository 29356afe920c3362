//! Domain events recorded on token entities.
//!
//! Entities record events as state changes; the issuing service drains them
//! after a successful repository save and hands each to the configured
//! [`EventPublisher`].

use std::fmt::Debug;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::model::{
    AccessTokenId, AuthCodeId, ClientId, IdTokenId, InitialAccessTokenId, RefreshTokenId,
    ResourceOwnerId, UserAccountId,
};

/// A state change of a token entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TokenEvent {
    /// A new access token was issued
    AccessTokenCreated {
        /// Token id
        access_token_id: AccessTokenId,
        /// Owner
        resource_owner_id: ResourceOwnerId,
        /// Client
        client_id: ClientId,
        /// Granted scopes
        scopes: Vec<String>,
        /// Expiry
        expires_at: DateTime<Utc>,
        /// Paired refresh token
        refresh_token_id: Option<RefreshTokenId>,
    },
    /// An access token was revoked
    AccessTokenRevoked {
        /// Token id
        access_token_id: AccessTokenId,
    },
    /// A new refresh token was issued
    RefreshTokenCreated {
        /// Token id
        refresh_token_id: RefreshTokenId,
        /// Owner
        resource_owner_id: ResourceOwnerId,
        /// Client
        client_id: ClientId,
        /// Granted scopes
        scopes: Vec<String>,
        /// Expiry
        expires_at: DateTime<Utc>,
    },
    /// An access token was linked to a refresh token
    AccessTokenAddedToRefreshToken {
        /// Refresh token id
        refresh_token_id: RefreshTokenId,
        /// Added access token id
        access_token_id: AccessTokenId,
    },
    /// A refresh token was revoked
    RefreshTokenRevoked {
        /// Token id
        refresh_token_id: RefreshTokenId,
    },
    /// A new authorization code was issued
    AuthCodeCreated {
        /// Code id
        auth_code_id: AuthCodeId,
        /// Owner
        resource_owner_id: ResourceOwnerId,
        /// Client
        client_id: ClientId,
        /// Granted scopes
        scopes: Vec<String>,
        /// Redirect URI bound to the code
        redirect_uri: String,
        /// Expiry
        expires_at: DateTime<Utc>,
    },
    /// An authorization code was redeemed
    AuthCodeMarkedAsUsed {
        /// Code id
        auth_code_id: AuthCodeId,
    },
    /// An authorization code was revoked
    AuthCodeRevoked {
        /// Code id
        auth_code_id: AuthCodeId,
    },
    /// An ID Token was issued
    IdTokenCreated {
        /// Token id
        id_token_id: IdTokenId,
        /// Owner
        resource_owner_id: ResourceOwnerId,
        /// Client
        client_id: ClientId,
        /// Expiry
        expires_at: DateTime<Utc>,
    },
    /// An ID Token was revoked
    IdTokenRevoked {
        /// Token id
        id_token_id: IdTokenId,
    },
    /// An initial access token was issued
    InitialAccessTokenCreated {
        /// Token id
        initial_access_token_id: InitialAccessTokenId,
        /// Owner
        user_account_id: UserAccountId,
        /// Expiry, if any
        expires_at: Option<DateTime<Utc>>,
    },
    /// An initial access token was revoked
    InitialAccessTokenRevoked {
        /// Token id
        initial_access_token_id: InitialAccessTokenId,
    },
}

impl TokenEvent {
    /// Stable event name used in audit records
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::AccessTokenCreated { .. } => "access_token.created",
            Self::AccessTokenRevoked { .. } => "access_token.revoked",
            Self::RefreshTokenCreated { .. } => "refresh_token.created",
            Self::AccessTokenAddedToRefreshToken { .. } => "refresh_token.access_token_added",
            Self::RefreshTokenRevoked { .. } => "refresh_token.revoked",
            Self::AuthCodeCreated { .. } => "auth_code.created",
            Self::AuthCodeMarkedAsUsed { .. } => "auth_code.marked_as_used",
            Self::AuthCodeRevoked { .. } => "auth_code.revoked",
            Self::IdTokenCreated { .. } => "id_token.created",
            Self::IdTokenRevoked { .. } => "id_token.revoked",
            Self::InitialAccessTokenCreated { .. } => "initial_access_token.created",
            Self::InitialAccessTokenRevoked { .. } => "initial_access_token.revoked",
        }
    }

    /// Identifier of the token the event is about
    #[must_use]
    pub fn token_id(&self) -> &str {
        match self {
            Self::AccessTokenCreated { access_token_id, .. }
            | Self::AccessTokenRevoked { access_token_id } => access_token_id.as_str(),
            Self::RefreshTokenCreated { refresh_token_id, .. }
            | Self::AccessTokenAddedToRefreshToken { refresh_token_id, .. }
            | Self::RefreshTokenRevoked { refresh_token_id } => refresh_token_id.as_str(),
            Self::AuthCodeCreated { auth_code_id, .. }
            | Self::AuthCodeMarkedAsUsed { auth_code_id }
            | Self::AuthCodeRevoked { auth_code_id } => auth_code_id.as_str(),
            Self::IdTokenCreated { id_token_id, .. } | Self::IdTokenRevoked { id_token_id } => {
                id_token_id.as_str()
            }
            Self::InitialAccessTokenCreated { initial_access_token_id, .. }
            | Self::InitialAccessTokenRevoked { initial_access_token_id } => {
                initial_access_token_id.as_str()
            }
        }
    }
}

/// Events recorded on an entity and not yet published
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingEvents(Vec<TokenEvent>);

impl PendingEvents {
    /// Record an event
    pub fn record(&mut self, event: TokenEvent) {
        self.0.push(event);
    }

    /// Take all pending events
    pub fn drain(&mut self) -> Vec<TokenEvent> {
        std::mem::take(&mut self.0)
    }

    /// Pending events, oldest first
    #[must_use]
    pub fn as_slice(&self) -> &[TokenEvent] {
        &self.0
    }
}

/// Entities carrying unpublished events
pub trait RecordsEvents {
    /// Drain the unpublished events, oldest first
    fn take_events(&mut self) -> Vec<TokenEvent>;
}

/// Sink for domain events
pub trait EventPublisher: Send + Sync + Debug {
    /// Publish one event
    fn publish(&self, event: &TokenEvent);
}

/// Publisher that keeps every event in memory
///
/// Useful for tests and for embedding applications that forward events
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct RecordingEventPublisher {
    events: Arc<Mutex<Vec<TokenEvent>>>,
}

impl RecordingEventPublisher {
    /// Create an empty recorder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the published events
    #[must_use]
    pub fn events(&self) -> Vec<TokenEvent> {
        self.events.lock().clone()
    }

    /// Names of the published events, in order
    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(TokenEvent::name).collect()
    }

    /// Forget every recorded event
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventPublisher for RecordingEventPublisher {
    fn publish(&self, event: &TokenEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Publish each event to `publisher`
pub(crate) fn publish_all(publisher: &dyn EventPublisher, events: Vec<TokenEvent>) {
    for event in &events {
        publisher.publish(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_events_drain() {
        let mut pending = PendingEvents::default();
        pending.record(TokenEvent::AuthCodeMarkedAsUsed {
            auth_code_id: AuthCodeId::new("c1"),
        });

        assert_eq!(pending.as_slice().len(), 1);
        let drained = pending.drain();
        assert_eq!(drained[0].name(), "auth_code.marked_as_used");
        assert_eq!(drained[0].token_id(), "c1");
        assert!(pending.as_slice().is_empty());
    }

    #[test]
    fn test_recording_publisher() {
        let publisher = RecordingEventPublisher::new();
        publisher.publish(&TokenEvent::AccessTokenRevoked {
            access_token_id: AccessTokenId::new("t1"),
        });

        assert_eq!(publisher.event_names(), vec!["access_token.revoked"]);
        publisher.clear();
        assert!(publisher.events().is_empty());
    }
}
