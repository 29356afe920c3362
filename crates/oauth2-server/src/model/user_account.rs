use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::UserAccountId;

/// Requested user attribute is not set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("The user account attribute \"{0}\" does not exist.")]
pub struct AttributeNotFound(pub String);

/// An end-user account
///
/// Attributes use the OpenID Connect standard claim names (`name`,
/// `email`, ...). Localized values are stored under `claim#locale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    /// Account identifier, the `sub` claim
    pub id: UserAccountId,
    /// Profile attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Last authentication instant, the `auth_time` claim
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

impl UserAccount {
    /// Create an account without attributes
    pub fn new(id: impl Into<UserAccountId>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
            last_login_at: None,
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Set the last authentication instant
    #[must_use]
    pub fn with_last_login_at(mut self, at: DateTime<Utc>) -> Self {
        self.last_login_at = Some(at);
        self
    }

    /// Whether `key` is set
    #[must_use]
    pub fn has(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// The attribute at `key`
    ///
    /// # Errors
    ///
    /// Returns [`AttributeNotFound`] when the attribute is not set.
    pub fn get(&self, key: &str) -> Result<&Value, AttributeNotFound> {
        self.attributes
            .get(key)
            .ok_or_else(|| AttributeNotFound(key.to_string()))
    }
}
