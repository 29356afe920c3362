//! Property tests for scope handling and token expiry

use chrono::{DateTime, Duration, Utc};
use oauth2_server::model::{
    ClientId, RefreshToken, RefreshTokenId, ResourceOwnerId, Token, TokenCore, UserAccountId,
};
use oauth2_server::scope::ScopeManager;
use proptest::prelude::*;

/// One RFC 6749 §3.3 scope-token
fn scope_token() -> impl Strategy<Value = String> {
    "[!#-\\[\\]-~]{1,12}"
}

fn distinct_scopes() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(scope_token(), 0..8).prop_map(|set| set.into_iter().collect())
}

fn refresh_token(expires_at: DateTime<Utc>) -> RefreshToken {
    let core = TokenCore::new(
        ResourceOwnerId::from(UserAccountId::new("alice")),
        ClientId::new("web"),
        expires_at,
    );
    RefreshToken::create(RefreshTokenId::new("rt"), core)
}

proptest! {
    #[test]
    fn prop_scope_parameter_round_trips(scopes in distinct_scopes()) {
        let parsed = ScopeManager::convert_to_array(&scopes.join(" ")).unwrap();
        prop_assert_eq!(parsed, scopes);
    }

    #[test]
    fn prop_duplicated_scope_rejected(scopes in distinct_scopes(), scope in scope_token()) {
        let mut with_duplicate = scopes;
        with_duplicate.push(scope.clone());
        with_duplicate.push(scope);
        prop_assert!(ScopeManager::convert_to_array(&with_duplicate.join(" ")).is_err());
    }

    #[test]
    fn prop_illegal_characters_rejected(prefix in scope_token(), illegal in "[\"\\\\\\x00-\\x1F\\x7F]") {
        let scope = format!("{prefix}{illegal}x");
        prop_assert!(ScopeManager::convert_to_array(&scope).is_err());
    }

    #[test]
    fn prop_subset_of_available_is_available(
        available in distinct_scopes(),
        mask in prop::collection::vec(any::<bool>(), 8),
    ) {
        let requested: Vec<String> = available
            .iter()
            .zip(mask)
            .filter_map(|(scope, keep)| keep.then(|| scope.clone()))
            .collect();
        prop_assert!(ScopeManager::are_request_scopes_available(&requested, &available));
    }

    #[test]
    fn prop_expiry_is_monotonic(lifetime in -10_000i64..10_000, elapsed in 0i64..20_000) {
        let now = Utc::now();
        let token = refresh_token(now + Duration::seconds(lifetime));
        let later = now + Duration::seconds(elapsed);

        prop_assert_eq!(token.has_expired_at(now), lifetime < 0);
        prop_assert_eq!(token.expires_in_at(now), u64::try_from(lifetime.max(0)).unwrap());
        // Once expired, a token stays expired
        if token.has_expired_at(now) {
            prop_assert!(token.has_expired_at(later));
        }
        prop_assert!(token.expires_in_at(later) <= token.expires_in_at(now));
    }
}
