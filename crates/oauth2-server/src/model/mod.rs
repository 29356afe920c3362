//! Domain entities: tokens, clients, user accounts.
//!
//! Token entities are immutable values. Every `with_*` / state transition
//! returns a new instance carrying the change and the domain event describing
//! it; the issuing service saves the instance, then drains and publishes the
//! pending events.

mod access_token;
mod auth_code;
mod client;
mod data_bag;
mod id_token;
mod initial_access_token;
mod refresh_token;
mod token;
mod user_account;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use access_token::AccessToken;
pub use auth_code::AuthCode;
pub use client::Client;
pub use data_bag::DataBag;
pub use id_token::IdToken;
pub use initial_access_token::InitialAccessToken;
pub use refresh_token::RefreshToken;
pub use token::{Token, TokenCore};
pub use user_account::{AttributeNotFound, UserAccount};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap an identifier value
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// The identifier value
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Access token identifier (the bearer value itself)
    AccessTokenId
);
string_id!(
    /// Refresh token identifier
    RefreshTokenId
);
string_id!(
    /// Authorization code identifier
    AuthCodeId
);
string_id!(
    /// ID Token identifier (the compact JWS)
    IdTokenId
);
string_id!(
    /// Initial access token identifier
    InitialAccessTokenId
);
string_id!(
    /// Client identifier
    ClientId
);
string_id!(
    /// User account identifier
    UserAccountId
);

/// The entity on whose behalf a token was issued
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum ResourceOwnerId {
    /// An end user
    UserAccount(UserAccountId),
    /// A client acting on its own behalf (`client_credentials`)
    Client(ClientId),
}

impl ResourceOwnerId {
    /// The raw identifier (`sub` claim value)
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::UserAccount(id) => id.as_str(),
            Self::Client(id) => id.as_str(),
        }
    }

    /// The user account id, when the owner is a user
    #[must_use]
    pub fn user_account_id(&self) -> Option<&UserAccountId> {
        match self {
            Self::UserAccount(id) => Some(id),
            Self::Client(_) => None,
        }
    }
}

impl fmt::Display for ResourceOwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<UserAccountId> for ResourceOwnerId {
    fn from(id: UserAccountId) -> Self {
        Self::UserAccount(id)
    }
}

impl From<ClientId> for ResourceOwnerId {
    fn from(id: ClientId) -> Self {
        Self::Client(id)
    }
}

/// Space-join scopes for the wire
pub(crate) fn join_scopes(scopes: &[String]) -> String {
    scopes.join(" ")
}
