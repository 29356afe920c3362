use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use super::claims::{claims_for_scopes, collect_claims};
use super::hash::token_hash;
use crate::error::OAuth2Result;
use crate::event::{EventPublisher, RecordsEvents, publish_all};
use crate::model::{ClientId, IdToken, IdTokenId, ResourceOwnerId, TokenCore, UserAccount};
use crate::repository::IdTokenRepository;
use crate::signer::TokenSigner;
use crate::token_id::RandomTokenIdGenerator;

/// What goes into one ID Token
#[derive(Debug, Clone)]
pub struct IdTokenBuilder {
    user_account: UserAccount,
    client_id: ClientId,
    scopes: Vec<String>,
    nonce: Option<String>,
    access_token: Option<String>,
    auth_code: Option<String>,
    requested_claims: Vec<String>,
    claims_locales: Option<String>,
}

impl IdTokenBuilder {
    /// ID Token about `user_account` for `client_id`
    pub fn new(user_account: UserAccount, client_id: ClientId, scopes: Vec<String>) -> Self {
        Self {
            user_account,
            client_id,
            scopes,
            nonce: None,
            access_token: None,
            auth_code: None,
            requested_claims: Vec::new(),
            claims_locales: None,
        }
    }

    /// Echo the authorization request `nonce`
    #[must_use]
    pub fn with_nonce(mut self, nonce: Option<&str>) -> Self {
        self.nonce = nonce.map(String::from);
        self
    }

    /// Add `at_hash` for this access token
    #[must_use]
    pub fn with_access_token(mut self, access_token: Option<&str>) -> Self {
        self.access_token = access_token.map(String::from);
        self
    }

    /// Add `c_hash` for this authorization code
    #[must_use]
    pub fn with_auth_code(mut self, auth_code: Option<&str>) -> Self {
        self.auth_code = auth_code.map(String::from);
        self
    }

    /// Claims requested individually through the `claims` parameter
    #[must_use]
    pub fn with_requested_claims(mut self, claims: Vec<String>) -> Self {
        self.requested_claims = claims;
        self
    }

    /// Preferred languages of the claims (`claims_locales`)
    #[must_use]
    pub fn with_claims_locales(mut self, claims_locales: Option<&str>) -> Self {
        self.claims_locales = claims_locales.map(String::from);
        self
    }

    /// The payload for an ID Token signed with `algorithm`
    ///
    /// # Errors
    ///
    /// Returns an internal error when a hash is needed and `algorithm` has
    /// no SHA-2 counterpart.
    pub fn claims(
        &self,
        issuer: &str,
        algorithm: &str,
        jti: &str,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> OAuth2Result<Map<String, Value>> {
        let mut claims = Map::new();
        claims.insert("iss".to_string(), Value::from(issuer));
        claims.insert("sub".to_string(), Value::from(self.user_account.id.as_str()));
        claims.insert("aud".to_string(), Value::from(self.client_id.as_str()));
        claims.insert("exp".to_string(), Value::from(expires_at.timestamp()));
        claims.insert("iat".to_string(), Value::from(issued_at.timestamp()));
        claims.insert("jti".to_string(), Value::from(jti));
        if let Some(auth_time) = self.user_account.last_login_at {
            claims.insert("auth_time".to_string(), Value::from(auth_time.timestamp()));
        }
        if let Some(nonce) = &self.nonce {
            claims.insert("nonce".to_string(), Value::from(nonce.as_str()));
        }
        if let Some(access_token) = &self.access_token {
            claims.insert("at_hash".to_string(), Value::from(token_hash(algorithm, access_token)?));
        }
        if let Some(auth_code) = &self.auth_code {
            claims.insert("c_hash".to_string(), Value::from(token_hash(algorithm, auth_code)?));
        }

        let mut names: Vec<&str> = claims_for_scopes(&self.scopes);
        for requested in &self.requested_claims {
            if !names.contains(&requested.as_str()) {
                names.push(requested);
            }
        }
        for (name, value) in collect_claims(&self.user_account, names, self.claims_locales.as_deref()) {
            // Registered claims computed above always win
            claims.entry(name).or_insert(value);
        }
        Ok(claims)
    }
}

/// Signs and stores ID Tokens
pub struct IdTokenFactory {
    issuer: String,
    signer: Arc<dyn TokenSigner>,
    id_tokens: Arc<dyn IdTokenRepository>,
    events: Arc<dyn EventPublisher>,
    lifetime: u64,
    jti: RandomTokenIdGenerator,
}

impl std::fmt::Debug for IdTokenFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenFactory")
            .field("issuer", &self.issuer)
            .field("signer", &self.signer)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl IdTokenFactory {
    /// Create the factory; `lifetime` is in seconds
    pub fn new(
        issuer: impl Into<String>,
        signer: Arc<dyn TokenSigner>,
        id_tokens: Arc<dyn IdTokenRepository>,
        events: Arc<dyn EventPublisher>,
        lifetime: u64,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            signer,
            id_tokens,
            events,
            lifetime,
            jti: RandomTokenIdGenerator::with_length(16),
        }
    }

    /// Sign, store and return an ID Token
    ///
    /// # Errors
    ///
    /// Returns signing, hashing and storage errors.
    pub async fn create(&self, builder: &IdTokenBuilder) -> OAuth2Result<IdToken> {
        let issued_at = Utc::now();
        let expires_at = TokenCore::expires_in_seconds(self.lifetime);
        let claims = builder.claims(
            &self.issuer,
            self.signer.algorithm(),
            &self.jti.random()?,
            issued_at,
            expires_at,
        )?;
        let jws = self.signer.sign(&claims)?;

        let core = TokenCore::new(
            ResourceOwnerId::UserAccount(builder.user_account.id.clone()),
            builder.client_id.clone(),
            expires_at,
        )
        .with_scopes(builder.scopes.clone());
        let mut token = IdToken::create(IdTokenId::new(jws), core, claims);
        self.id_tokens.save(&token).await?;
        publish_all(self.events.as_ref(), token.take_events());

        debug!(client_id = %builder.client_id, "ID Token issued");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use jsonwebtoken::Algorithm;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::event::RecordingEventPublisher;
    use crate::memory::InMemoryStore;
    use crate::signer::JwtSigner;

    fn account() -> UserAccount {
        UserAccount::new("alice")
            .with_attribute("name", "Alice")
            .with_attribute("email", "alice@example.com")
            .with_attribute("phone_number", "+33 1 23 45 67 89")
            .with_last_login_at(DateTime::from_timestamp(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn test_claims_follow_scopes_and_requests() {
        // GIVEN a builder granted profile and asking for phone_number
        let builder = IdTokenBuilder::new(
            account(),
            "web".into(),
            vec!["openid".to_string(), "profile".to_string()],
        )
        .with_nonce(Some("n-0S6_WzA2Mj"))
        .with_requested_claims(vec!["phone_number".to_string()]);
        let now = Utc::now();

        // WHEN computing the claims
        let claims = builder
            .claims("https://issuer.example", "HS256", "jti-1", now, now + Duration::seconds(60))
            .unwrap();

        // THEN registered, scope and requested claims are present
        assert_eq!(claims["sub"], "alice");
        assert_eq!(claims["aud"], "web");
        assert_eq!(claims["nonce"], "n-0S6_WzA2Mj");
        assert_eq!(claims["auth_time"], 1_700_000_000);
        assert_eq!(claims["name"], "Alice");
        assert_eq!(claims["phone_number"], "+33 1 23 45 67 89");
        assert!(!claims.contains_key("email"));
        assert!(!claims.contains_key("at_hash"));
    }

    #[test]
    fn test_hashes() {
        let builder = IdTokenBuilder::new(account(), "web".into(), vec!["openid".to_string()])
            .with_access_token(Some("jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y"))
            .with_auth_code(Some("code"));
        let now = Utc::now();

        let claims = builder
            .claims("https://issuer.example", "RS256", "jti-1", now, now)
            .unwrap();

        assert_eq!(claims["at_hash"], "77QmUPtjPfzWtF2AnpK9RQ");
        assert!(claims.contains_key("c_hash"));
    }

    #[tokio::test]
    async fn test_factory_signs_and_stores() {
        let store = InMemoryStore::new();
        let events = RecordingEventPublisher::new();
        let signer = Arc::new(JwtSigner::hmac(Algorithm::HS256, b"0123456789abcdef0123456789abcdef").unwrap());
        let factory = IdTokenFactory::new(
            "https://issuer.example",
            signer.clone(),
            store.id_tokens.clone(),
            Arc::new(events.clone()),
            600,
        );
        let builder = IdTokenBuilder::new(account(), "web".into(), vec!["openid".to_string()]);

        let token = factory.create(&builder).await.unwrap();

        let verified = signer.verify(token.id().as_str()).unwrap();
        assert_eq!(&verified, token.claims());
        assert_eq!(events.event_names(), vec!["id_token.created"]);
        assert!(
            crate::repository::IdTokenRepository::find(store.id_tokens.as_ref(), token.id())
                .await
                .unwrap()
                .is_some()
        );
    }
}
