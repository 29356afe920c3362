//! Structured audit logging of token events
//!
//! [`AuditLogger`] is the default [`EventPublisher`]: every domain event is
//! written as one `tracing` record under the `audit::oauth2` target, so the
//! embedding application decides where the audit trail goes with its
//! subscriber configuration.
//!
//! Token identifiers are bearer credentials and are never logged verbatim:
//! they are always reduced to a short SHA-256 fingerprint. Subject and client
//! identifiers are logged as-is unless identifier hashing is enabled.
//!
//! ```rust
//! use oauth2_server::audit::AuditLogger;
//! use oauth2_server::event::{EventPublisher, TokenEvent};
//! use oauth2_server::model::AccessTokenId;
//!
//! let logger = AuditLogger::new("auth-server").with_identifier_hashing(true);
//! logger.publish(&TokenEvent::AccessTokenRevoked {
//!     access_token_id: AccessTokenId::new("2YotnFZFEjr1zCsicMWpAA"),
//! });
//! ```

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::event::{EventPublisher, TokenEvent};

/// Audit logger for token events
#[derive(Debug, Clone)]
pub struct AuditLogger {
    /// Service name for event attribution
    service_name: String,
    /// Whether to hash subject and client identifiers
    hash_identifiers: bool,
}

/// One audit trail entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    /// Unique, time-ordered record id
    pub id: Uuid,
    /// When the record was produced
    pub timestamp: DateTime<Utc>,
    /// Emitting service
    pub service: String,
    /// The event
    pub event: TokenEvent,
}

impl AuditLogger {
    /// Create a new audit logger with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            hash_identifiers: false,
        }
    }

    /// Builder method to configure identifier hashing
    pub fn with_identifier_hashing(mut self, hash: bool) -> Self {
        self.hash_identifiers = hash;
        self
    }

    /// Wrap an event into a record
    pub fn record(&self, event: &TokenEvent) -> AuditRecord {
        AuditRecord {
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            service: self.service_name.clone(),
            event: event.clone(),
        }
    }

    /// Log a token event
    pub fn log(&self, event: &TokenEvent) {
        let record = self.record(event);
        let token = fingerprint(event.token_id());

        match event {
            TokenEvent::AccessTokenCreated {
                resource_owner_id,
                client_id,
                scopes,
                expires_at,
                ..
            } => {
                info!(
                    target: "audit::oauth2",
                    audit_id = %record.id,
                    event_type = event.name(),
                    token = %token,
                    sub = %self.maybe_hash(resource_owner_id.as_str()),
                    client_id = %self.maybe_hash(client_id.as_str()),
                    scope = %scopes.join(" "),
                    expires_at = %expires_at,
                    service = %self.service_name,
                    "Access token issued"
                );
            }
            TokenEvent::RefreshTokenCreated {
                resource_owner_id,
                client_id,
                scopes,
                expires_at,
                ..
            } => {
                info!(
                    target: "audit::oauth2",
                    audit_id = %record.id,
                    event_type = event.name(),
                    token = %token,
                    sub = %self.maybe_hash(resource_owner_id.as_str()),
                    client_id = %self.maybe_hash(client_id.as_str()),
                    scope = %scopes.join(" "),
                    expires_at = %expires_at,
                    service = %self.service_name,
                    "Refresh token issued"
                );
            }
            TokenEvent::AuthCodeCreated {
                resource_owner_id,
                client_id,
                redirect_uri,
                ..
            } => {
                info!(
                    target: "audit::oauth2",
                    audit_id = %record.id,
                    event_type = event.name(),
                    token = %token,
                    sub = %self.maybe_hash(resource_owner_id.as_str()),
                    client_id = %self.maybe_hash(client_id.as_str()),
                    redirect_uri = %redirect_uri,
                    service = %self.service_name,
                    "Authorization code issued"
                );
            }
            TokenEvent::IdTokenCreated {
                resource_owner_id,
                client_id,
                ..
            } => {
                info!(
                    target: "audit::oauth2",
                    audit_id = %record.id,
                    event_type = event.name(),
                    token = %token,
                    sub = %self.maybe_hash(resource_owner_id.as_str()),
                    client_id = %self.maybe_hash(client_id.as_str()),
                    service = %self.service_name,
                    "ID token issued"
                );
            }
            TokenEvent::InitialAccessTokenCreated { user_account_id, .. } => {
                info!(
                    target: "audit::oauth2",
                    audit_id = %record.id,
                    event_type = event.name(),
                    token = %token,
                    sub = %self.maybe_hash(user_account_id.as_str()),
                    service = %self.service_name,
                    "Initial access token issued"
                );
            }
            TokenEvent::AccessTokenAddedToRefreshToken { access_token_id, .. } => {
                info!(
                    target: "audit::oauth2",
                    audit_id = %record.id,
                    event_type = event.name(),
                    token = %token,
                    access_token = %fingerprint(access_token_id.as_str()),
                    service = %self.service_name,
                    "Access token linked to refresh token"
                );
            }
            TokenEvent::AuthCodeMarkedAsUsed { .. } => {
                info!(
                    target: "audit::oauth2",
                    audit_id = %record.id,
                    event_type = event.name(),
                    token = %token,
                    service = %self.service_name,
                    "Authorization code redeemed"
                );
            }
            TokenEvent::AccessTokenRevoked { .. }
            | TokenEvent::RefreshTokenRevoked { .. }
            | TokenEvent::AuthCodeRevoked { .. }
            | TokenEvent::IdTokenRevoked { .. }
            | TokenEvent::InitialAccessTokenRevoked { .. } => {
                warn!(
                    target: "audit::oauth2",
                    audit_id = %record.id,
                    event_type = event.name(),
                    token = %token,
                    service = %self.service_name,
                    "Token revoked"
                );
            }
        }
    }

    fn maybe_hash(&self, value: &str) -> String {
        if self.hash_identifiers {
            fingerprint(value)
        } else {
            value.to_string()
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new("oauth2-server")
    }
}

impl EventPublisher for AuditLogger {
    fn publish(&self, event: &TokenEvent) {
        self.log(event);
    }
}

/// `sha256:` followed by the first 16 hex digits of the SHA-256 digest
fn fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let mut out = String::from("sha256:");
    for byte in &digest[..8] {
        let _ = write!(out, "{byte:02x}");
    }
    out
}
