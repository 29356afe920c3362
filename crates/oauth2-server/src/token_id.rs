//! Token identifier generation
//!
//! Identifiers are the bearer values handed to clients, so they come from a
//! CSPRNG (`ring::rand::SystemRandom`) or are signed JWTs.

use std::fmt::Debug;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde_json::{Map, Value};

use crate::error::{OAuth2Error, OAuth2Result};
use crate::model::{ClientId, ResourceOwnerId};
use crate::signer::TokenSigner;

/// Which kind of token an identifier is generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Access token
    AccessToken,
    /// Refresh token
    RefreshToken,
    /// Authorization code
    AuthCode,
    /// Initial access token
    InitialAccessToken,
}

/// What the generator knows about the token being issued
#[derive(Debug, Clone)]
pub struct TokenIdContext<'a> {
    /// Kind of token
    pub kind: TokenKind,
    /// Client the token is issued to
    pub client_id: &'a ClientId,
    /// Owner of the token
    pub resource_owner_id: &'a ResourceOwnerId,
    /// Granted scopes
    pub scopes: &'a [String],
    /// Expiry of the token
    pub expires_at: DateTime<Utc>,
}

/// Generates token identifiers
pub trait TokenIdGenerator: Send + Sync + Debug {
    /// Produce a fresh identifier
    ///
    /// # Errors
    ///
    /// Returns an internal error when randomness or signing is unavailable.
    fn generate(&self, context: &TokenIdContext<'_>) -> OAuth2Result<String>;
}

/// Random, URL-safe identifiers
#[derive(Debug, Clone)]
pub struct RandomTokenIdGenerator {
    rng: SystemRandom,
    length: usize,
}

impl RandomTokenIdGenerator {
    /// Minimum entropy in bytes (RFC 6749 §10.10 recommends at least 128 bits)
    pub const MIN_LENGTH: usize = 16;

    /// Generator producing 32 random bytes per identifier
    pub fn new() -> Self {
        Self {
            rng: SystemRandom::new(),
            length: 32,
        }
    }

    /// Generator producing `length` random bytes, never fewer than [`Self::MIN_LENGTH`]
    pub fn with_length(length: usize) -> Self {
        Self {
            rng: SystemRandom::new(),
            length: length.max(Self::MIN_LENGTH),
        }
    }

    /// Produce a random identifier without context
    ///
    /// # Errors
    ///
    /// Returns an internal error if the system RNG fails.
    pub fn random(&self) -> OAuth2Result<String> {
        let mut bytes = vec![0u8; self.length];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| OAuth2Error::internal("The system random number generator failed."))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

impl Default for RandomTokenIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenIdGenerator for RandomTokenIdGenerator {
    fn generate(&self, _context: &TokenIdContext<'_>) -> OAuth2Result<String> {
        self.random()
    }
}

/// Self-contained JWT access tokens (RFC 9068 claim layout)
///
/// Only access tokens become JWTs; every other kind falls back to a random
/// identifier.
#[derive(Debug, Clone)]
pub struct JwtAccessTokenIdGenerator {
    issuer: String,
    signer: Arc<dyn TokenSigner>,
    random: RandomTokenIdGenerator,
}

impl JwtAccessTokenIdGenerator {
    /// Create a generator signing with `signer` for `issuer`
    pub fn new(issuer: impl Into<String>, signer: Arc<dyn TokenSigner>) -> Self {
        Self {
            issuer: issuer.into(),
            signer,
            random: RandomTokenIdGenerator::new(),
        }
    }
}

impl TokenIdGenerator for JwtAccessTokenIdGenerator {
    fn generate(&self, context: &TokenIdContext<'_>) -> OAuth2Result<String> {
        if context.kind != TokenKind::AccessToken {
            return self.random.random();
        }

        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("iss".to_string(), Value::from(self.issuer.as_str()));
        claims.insert("sub".to_string(), Value::from(context.resource_owner_id.as_str()));
        claims.insert("aud".to_string(), Value::from(context.client_id.as_str()));
        claims.insert("client_id".to_string(), Value::from(context.client_id.as_str()));
        claims.insert("iat".to_string(), Value::from(now));
        claims.insert("nbf".to_string(), Value::from(now));
        claims.insert("exp".to_string(), Value::from(context.expires_at.timestamp()));
        claims.insert("jti".to_string(), Value::from(self.random.random()?));
        if !context.scopes.is_empty() {
            claims.insert("scope".to_string(), Value::from(context.scopes.join(" ")));
        }

        self.signer.sign(&claims)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::Algorithm;

    use super::*;
    use crate::model::UserAccountId;
    use crate::signer::JwtSigner;

    fn context<'a>(
        kind: TokenKind,
        client_id: &'a ClientId,
        owner: &'a ResourceOwnerId,
        scopes: &'a [String],
    ) -> TokenIdContext<'a> {
        TokenIdContext {
            kind,
            client_id,
            resource_owner_id: owner,
            scopes,
            expires_at: Utc::now(),
        }
    }

    #[test]
    fn test_random_ids_are_unique_and_url_safe() {
        let generator = RandomTokenIdGenerator::new();
        let a = generator.random().unwrap();
        let b = generator.random().unwrap();

        assert_ne!(a, b);
        assert_eq!(a.len(), 43); // 32 bytes, unpadded base64url
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_minimum_length_enforced() {
        let generator = RandomTokenIdGenerator::with_length(4);
        assert_eq!(generator.random().unwrap().len(), 22);
    }

    #[test]
    fn test_jwt_access_tokens() {
        let signer: Arc<dyn TokenSigner> =
            Arc::new(JwtSigner::hmac(Algorithm::HS256, b"jwt-access-token-secret-32-bytes").unwrap());
        let generator = JwtAccessTokenIdGenerator::new("https://auth.example.com", signer.clone());
        let client_id = ClientId::new("c1");
        let owner = ResourceOwnerId::from(UserAccountId::new("alice"));
        let scopes = vec!["read".to_string()];

        let jwt = generator
            .generate(&context(TokenKind::AccessToken, &client_id, &owner, &scopes))
            .unwrap();
        let claims = signer.verify(&jwt).unwrap();
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["scope"], "read");
        assert_eq!(claims["iss"], "https://auth.example.com");

        let refresh = generator
            .generate(&context(TokenKind::RefreshToken, &client_id, &owner, &scopes))
            .unwrap();
        assert!(!refresh.contains('.'));
    }
}
