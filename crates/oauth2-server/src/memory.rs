//! In-memory repositories backed by `DashMap`
//!
//! For development, tests and single-process deployments. Every operation
//! that reads and changes an entry does so under the entry's shard lock, so
//! [`AuthCodeRepository::mark_as_used`] is atomic.

use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::OAuth2Result;
use crate::event::RecordsEvents;
use crate::model::{
    AccessToken, AccessTokenId, AuthCode, AuthCodeId, Client, ClientId, IdToken, IdTokenId,
    InitialAccessToken, InitialAccessTokenId, RefreshToken, RefreshTokenId, Token, UserAccount,
    UserAccountId,
};
use crate::repository::{
    AccessTokenRepository, AuthCodeRepository, ClientRepository, IdTokenRepository,
    InitialAccessTokenRepository, RefreshTokenRepository, Repositories, UserAccountRepository,
};

/// Entity table; stored values never carry pending events
#[derive(Debug)]
struct Table<K: Eq + Hash, V>(DashMap<K, V>);

impl<K, V> Default for Table<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self(DashMap::new())
    }
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + RecordsEvents,
{
    fn save(&self, id: &K, value: &V) {
        let mut stored = value.clone();
        stored.take_events();
        self.0.insert(id.clone(), stored);
    }

    fn find(&self, id: &K) -> Option<V> {
        self.0.get(id).map(|entry| entry.value().clone())
    }

    /// Replace an entry with `f(current)` under its lock, returning the new
    /// value with its events; `f` returning `None` leaves the entry untouched
    fn update(&self, id: &K, f: impl FnOnce(&V) -> Option<V>) -> Option<V> {
        let mut entry = self.0.get_mut(id)?;
        let updated = f(entry.value())?;
        let mut stored = updated.clone();
        stored.take_events();
        *entry.value_mut() = stored;
        Some(updated)
    }

    fn len(&self) -> usize {
        self.0.len()
    }
}

/// In-memory [`ClientRepository`]
#[derive(Debug, Default)]
pub struct InMemoryClientRepository {
    clients: DashMap<ClientId, Client>,
}

impl InMemoryClientRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a client
    pub fn insert(&self, client: Client) {
        self.clients.insert(client.id.clone(), client);
    }
}

#[async_trait]
impl ClientRepository for InMemoryClientRepository {
    async fn find(&self, id: &ClientId) -> OAuth2Result<Option<Client>> {
        Ok(self.clients.get(id).map(|c| c.value().clone()))
    }
}

/// In-memory [`UserAccountRepository`]
#[derive(Debug, Default)]
pub struct InMemoryUserAccountRepository {
    accounts: DashMap<UserAccountId, UserAccount>,
}

impl InMemoryUserAccountRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace an account
    pub fn insert(&self, account: UserAccount) {
        self.accounts.insert(account.id.clone(), account);
    }
}

#[async_trait]
impl UserAccountRepository for InMemoryUserAccountRepository {
    async fn find(&self, id: &UserAccountId) -> OAuth2Result<Option<UserAccount>> {
        Ok(self.accounts.get(id).map(|a| a.value().clone()))
    }
}

/// In-memory [`AccessTokenRepository`]
#[derive(Debug, Default)]
pub struct InMemoryAccessTokenRepository {
    tokens: Table<AccessTokenId, AccessToken>,
}

impl InMemoryAccessTokenRepository {
    /// Number of stored tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AccessTokenRepository for InMemoryAccessTokenRepository {
    async fn save(&self, token: &AccessToken) -> OAuth2Result<()> {
        self.tokens.save(token.id(), token);
        Ok(())
    }

    async fn find(&self, id: &AccessTokenId) -> OAuth2Result<Option<AccessToken>> {
        Ok(self.tokens.find(id))
    }

    async fn revoke(&self, id: &AccessTokenId) -> OAuth2Result<Option<AccessToken>> {
        Ok(self
            .tokens
            .update(id, |t| Some(if t.is_revoked() { t.clone() } else { t.revoked() })))
    }
}

/// In-memory [`RefreshTokenRepository`]
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenRepository {
    tokens: Table<RefreshTokenId, RefreshToken>,
}

impl InMemoryRefreshTokenRepository {
    /// Number of stored tokens
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenRepository {
    async fn save(&self, token: &RefreshToken) -> OAuth2Result<()> {
        self.tokens.save(token.id(), token);
        Ok(())
    }

    async fn find(&self, id: &RefreshTokenId) -> OAuth2Result<Option<RefreshToken>> {
        Ok(self.tokens.find(id))
    }

    async fn revoke(&self, id: &RefreshTokenId) -> OAuth2Result<Option<RefreshToken>> {
        Ok(self
            .tokens
            .update(id, |t| Some(if t.is_revoked() { t.clone() } else { t.revoked() })))
    }

    async fn add_access_token(
        &self,
        id: &RefreshTokenId,
        access_token_id: &AccessTokenId,
    ) -> OAuth2Result<Option<RefreshToken>> {
        Ok(self
            .tokens
            .update(id, |t| t.is_active().then(|| t.with_access_token(access_token_id))))
    }

    async fn revoke_if_active(&self, id: &RefreshTokenId) -> OAuth2Result<Option<RefreshToken>> {
        Ok(self.tokens.update(id, |t| t.is_active().then(|| t.revoked())))
    }
}

/// In-memory [`AuthCodeRepository`]
#[derive(Debug, Default)]
pub struct InMemoryAuthCodeRepository {
    codes: Table<AuthCodeId, AuthCode>,
}

#[async_trait]
impl AuthCodeRepository for InMemoryAuthCodeRepository {
    async fn save(&self, code: &AuthCode) -> OAuth2Result<()> {
        self.codes.save(code.id(), code);
        Ok(())
    }

    async fn find(&self, id: &AuthCodeId) -> OAuth2Result<Option<AuthCode>> {
        Ok(self.codes.find(id))
    }

    async fn revoke(&self, id: &AuthCodeId) -> OAuth2Result<Option<AuthCode>> {
        Ok(self
            .codes
            .update(id, |c| Some(if c.is_revoked() { c.clone() } else { c.revoked() })))
    }

    async fn mark_as_used(&self, id: &AuthCodeId) -> OAuth2Result<Option<AuthCode>> {
        Ok(self.codes.update(id, |code| {
            code.is_active().then(|| code.mark_as_used())
        }))
    }
}

/// In-memory [`IdTokenRepository`]
#[derive(Debug, Default)]
pub struct InMemoryIdTokenRepository {
    tokens: Table<IdTokenId, IdToken>,
}

#[async_trait]
impl IdTokenRepository for InMemoryIdTokenRepository {
    async fn save(&self, token: &IdToken) -> OAuth2Result<()> {
        self.tokens.save(token.id(), token);
        Ok(())
    }

    async fn find(&self, id: &IdTokenId) -> OAuth2Result<Option<IdToken>> {
        Ok(self.tokens.find(id))
    }

    async fn revoke(&self, id: &IdTokenId) -> OAuth2Result<Option<IdToken>> {
        Ok(self
            .tokens
            .update(id, |t| Some(if t.is_revoked() { t.clone() } else { t.revoked() })))
    }
}

/// In-memory [`InitialAccessTokenRepository`]
#[derive(Debug, Default)]
pub struct InMemoryInitialAccessTokenRepository {
    tokens: Table<InitialAccessTokenId, InitialAccessToken>,
}

#[async_trait]
impl InitialAccessTokenRepository for InMemoryInitialAccessTokenRepository {
    async fn save(&self, token: &InitialAccessToken) -> OAuth2Result<()> {
        self.tokens.save(token.id(), token);
        Ok(())
    }

    async fn find(&self, id: &InitialAccessTokenId) -> OAuth2Result<Option<InitialAccessToken>> {
        Ok(self.tokens.find(id))
    }

    async fn revoke(&self, id: &InitialAccessTokenId) -> OAuth2Result<Option<InitialAccessToken>> {
        Ok(self
            .tokens
            .update(id, |t| Some(if t.is_revoked() { t.clone() } else { t.revoked() })))
    }
}

/// A full set of in-memory repositories
///
/// The concrete handles are kept so that clients and accounts can be
/// registered and storage inspected.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    /// Clients
    pub clients: Arc<InMemoryClientRepository>,
    /// User accounts
    pub user_accounts: Arc<InMemoryUserAccountRepository>,
    /// Access tokens
    pub access_tokens: Arc<InMemoryAccessTokenRepository>,
    /// Refresh tokens
    pub refresh_tokens: Arc<InMemoryRefreshTokenRepository>,
    /// Authorization codes
    pub auth_codes: Arc<InMemoryAuthCodeRepository>,
    /// ID Tokens
    pub id_tokens: Arc<InMemoryIdTokenRepository>,
    /// Initial access tokens
    pub initial_access_tokens: Arc<InMemoryInitialAccessTokenRepository>,
}

impl InMemoryStore {
    /// Create empty repositories
    pub fn new() -> Self {
        Self::default()
    }

    /// The repositories as trait objects
    pub fn repositories(&self) -> Repositories {
        Repositories {
            clients: self.clients.clone(),
            user_accounts: self.user_accounts.clone(),
            access_tokens: self.access_tokens.clone(),
            refresh_tokens: self.refresh_tokens.clone(),
            auth_codes: self.auth_codes.clone(),
            id_tokens: self.id_tokens.clone(),
            initial_access_tokens: self.initial_access_tokens.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::{ResourceOwnerId, TokenCore};

    fn core(lifetime: i64) -> TokenCore {
        TokenCore::new(
            ResourceOwnerId::from(UserAccountId::new("alice")),
            ClientId::new("c1"),
            Utc::now() + Duration::seconds(lifetime),
        )
    }

    fn code(id: &str) -> AuthCode {
        AuthCode::create(AuthCodeId::new(id), core(30), BTreeMap::new(), "https://c/cb", false)
    }

    async fn refresh_tokens(lifetime: i64) -> (InMemoryRefreshTokenRepository, RefreshTokenId) {
        let repo = InMemoryRefreshTokenRepository::default();
        let id = RefreshTokenId::new("rt");
        repo.save(&RefreshToken::create(id.clone(), core(lifetime))).await.unwrap();
        (repo, id)
    }

    #[tokio::test]
    async fn test_saved_entities_have_no_pending_events() {
        let repo = InMemoryAuthCodeRepository::default();
        repo.save(&code("a")).await.unwrap();

        let mut stored = repo.find(&AuthCodeId::new("a")).await.unwrap().unwrap();
        assert!(stored.take_events().is_empty());
    }

    #[tokio::test]
    async fn test_mark_as_used_succeeds_once() {
        let repo = InMemoryAuthCodeRepository::default();
        repo.save(&code("a")).await.unwrap();
        let id = AuthCodeId::new("a");

        let mut first = repo.mark_as_used(&id).await.unwrap().unwrap();
        assert_eq!(first.take_events().len(), 1);
        assert!(repo.mark_as_used(&id).await.unwrap().is_none());
        assert!(repo.mark_as_used(&AuthCodeId::new("missing")).await.unwrap().is_none());
        assert!(repo.find(&id).await.unwrap().unwrap().is_used());
    }

    #[tokio::test]
    async fn test_revoked_code_cannot_be_used() {
        let repo = InMemoryAuthCodeRepository::default();
        repo.save(&code("a")).await.unwrap();
        let id = AuthCodeId::new("a");

        assert!(repo.revoke(&id).await.unwrap().unwrap().is_revoked());
        assert!(repo.mark_as_used(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_code_cannot_be_used() {
        let repo = InMemoryAuthCodeRepository::default();
        let id = AuthCodeId::new("late");
        let expired =
            AuthCode::create(id.clone(), core(-1), BTreeMap::new(), "https://c/cb", false);
        repo.save(&expired).await.unwrap();

        assert!(repo.mark_as_used(&id).await.unwrap().is_none());
        assert!(!repo.find(&id).await.unwrap().unwrap().is_used());
    }

    #[tokio::test]
    async fn test_add_access_token_refused_once_revoked() {
        // GIVEN: A refresh token revoked after a caller loaded it
        let (repo, id) = refresh_tokens(60).await;
        let loaded = repo.find(&id).await.unwrap().unwrap();
        repo.revoke(&id).await.unwrap();

        // WHEN: Linking an access token to it
        let linked = repo.add_access_token(loaded.id(), &AccessTokenId::new("at")).await.unwrap();

        // THEN: The link is refused and the revocation stands
        assert!(linked.is_none());
        let stored = repo.find(&id).await.unwrap().unwrap();
        assert!(stored.is_revoked());
        assert!(stored.access_token_ids().is_empty());
    }

    #[tokio::test]
    async fn test_add_access_token_refused_when_expired() {
        let (repo, id) = refresh_tokens(-1).await;
        let linked = repo.add_access_token(&id, &AccessTokenId::new("at")).await.unwrap();
        assert!(linked.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_links_are_all_kept() {
        let (repo, id) = refresh_tokens(60).await;
        let repo = Arc::new(repo);

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let repo = repo.clone();
                let id = id.clone();
                tokio::spawn(async move {
                    repo.add_access_token(&id, &AccessTokenId::new(format!("at-{i}")))
                        .await
                        .unwrap()
                        .is_some()
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        assert_eq!(repo.find(&id).await.unwrap().unwrap().access_token_ids().len(), 16);
    }

    #[tokio::test]
    async fn test_revoke_if_active_succeeds_once() {
        let (repo, id) = refresh_tokens(60).await;

        let mut first = repo.revoke_if_active(&id).await.unwrap().unwrap();
        assert_eq!(first.take_events().len(), 1);
        assert!(repo.revoke_if_active(&id).await.unwrap().is_none());
        assert!(repo.revoke_if_active(&RefreshTokenId::new("missing")).await.unwrap().is_none());
        // Plain revocation stays idempotent
        assert!(repo.revoke(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let repo = InMemoryAuthCodeRepository::default();
        repo.save(&code("a")).await.unwrap();
        let id = AuthCodeId::new("a");

        let mut first = repo.revoke(&id).await.unwrap().unwrap();
        let mut second = repo.revoke(&id).await.unwrap().unwrap();
        assert_eq!(first.take_events().len(), 1);
        assert!(second.take_events().is_empty());
        assert!(repo.revoke(&AuthCodeId::new("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_store_wires_all_repositories() {
        let store = InMemoryStore::new();
        store.clients.insert(Client::new("c1", "none"));

        let repositories = store.repositories();
        assert!(repositories.clients.has(&ClientId::new("c1")).await.unwrap());
        assert!(!repositories.clients.has(&ClientId::new("c2")).await.unwrap());
    }
}
