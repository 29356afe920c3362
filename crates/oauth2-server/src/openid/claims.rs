//! Standard claims of the user account (OpenID Connect Core §5.1, §5.4, §5.5)

use serde_json::{Map, Value};
use tracing::warn;

use crate::model::UserAccount;

/// Claims released by each profile scope
pub const SCOPE_CLAIMS: [(&str, &[&str]); 4] = [
    (
        "profile",
        &[
            "name",
            "family_name",
            "given_name",
            "middle_name",
            "nickname",
            "preferred_username",
            "profile",
            "picture",
            "website",
            "gender",
            "birthdate",
            "zoneinfo",
            "locale",
            "updated_at",
        ],
    ),
    ("email", &["email", "email_verified"]),
    ("address", &["address"]),
    ("phone", &["phone_number", "phone_number_verified"]),
];

/// Claim names released by `scopes`, in declaration order
pub fn claims_for_scopes(scopes: &[String]) -> Vec<&'static str> {
    SCOPE_CLAIMS
        .iter()
        .filter(|(scope, _)| scopes.iter().any(|s| s == scope))
        .flat_map(|(_, claims)| claims.iter().copied())
        .collect()
}

/// Claim names requested for the ID Token by a `claims` parameter
///
/// An unparsable parameter requests nothing.
pub fn requested_id_token_claims(claims_parameter: Option<&str>) -> Vec<String> {
    let Some(raw) = claims_parameter else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(mut request)) => match request.remove("id_token") {
            Some(Value::Object(claims)) => claims.into_iter().map(|(name, _)| name).collect(),
            _ => Vec::new(),
        },
        _ => {
            warn!("Ignoring a claims parameter that is not a JSON object");
            Vec::new()
        }
    }
}

/// Copy the user account attributes for `claims`
///
/// For each claim the localized values `claim#locale` come first, in the
/// `claims_locales` order, then the default value. Missing attributes are
/// skipped.
pub fn collect_claims<'a>(
    user_account: &UserAccount,
    claims: impl IntoIterator<Item = &'a str>,
    claims_locales: Option<&str>,
) -> Map<String, Value> {
    let locales: Vec<&str> = claims_locales
        .map(|l| l.split(' ').filter(|l| !l.is_empty()).collect())
        .unwrap_or_default();
    let mut collected = Map::new();
    for claim in claims {
        for locale in &locales {
            let localized = format!("{claim}#{locale}");
            if let Ok(value) = user_account.get(&localized) {
                collected.insert(localized, value.clone());
            }
        }
        if let Ok(value) = user_account.get(claim) {
            collected.insert(claim.to_string(), value.clone());
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn scopes(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_claims_for_scopes() {
        assert_eq!(
            claims_for_scopes(&scopes(&["openid", "email", "phone"])),
            vec!["email", "email_verified", "phone_number", "phone_number_verified"]
        );
        assert!(claims_for_scopes(&scopes(&["openid"])).is_empty());
    }

    #[test]
    fn test_requested_id_token_claims() {
        let raw = r#"{"id_token":{"email":{"essential":true},"locale":null},"userinfo":{"name":null}}"#;
        assert_eq!(requested_id_token_claims(Some(raw)), vec!["email", "locale"]);
        assert!(requested_id_token_claims(Some("not json")).is_empty());
        assert!(requested_id_token_claims(None).is_empty());
    }

    #[test]
    fn test_collect_localized_claims() {
        let account = UserAccount::new("alice")
            .with_attribute("name", "Alice")
            .with_attribute("name#fr", "Alice (fr)")
            .with_attribute("email", "alice@example.com");

        let claims = collect_claims(&account, ["name", "email", "picture"], Some("fr de"));

        assert_eq!(claims.get("name#fr"), Some(&Value::from("Alice (fr)")));
        assert_eq!(claims.get("name"), Some(&Value::from("Alice")));
        assert_eq!(claims.get("email"), Some(&Value::from("alice@example.com")));
        assert!(!claims.contains_key("picture"));
        assert!(!claims.contains_key("name#de"));
    }
}
