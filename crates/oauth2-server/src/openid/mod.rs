//! OpenID Connect support (feature `openid`)
//!
//! - [`IdTokenResponseType`] for the `id_token` response type and its
//!   combinations (`code id_token`, `id_token token`, ...)
//! - [`OpenIdConnectExtension`] issuing ID Tokens at the token endpoint
//! - [`IdTokenBuilder`] / [`IdTokenFactory`] for the claims and signing

pub mod claims;
mod extension;
pub mod hash;
mod id_token;
mod response_type;

pub use extension::OpenIdConnectExtension;
pub use id_token::{IdTokenBuilder, IdTokenFactory};
pub use response_type::IdTokenResponseType;
