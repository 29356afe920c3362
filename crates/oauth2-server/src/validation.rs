//! Request value validation shared by the endpoints
//!
//! - Redirect URI format (RFC 6749 §3.1.2)
//! - Constant-time secret comparison
//! - JSONP callback names

use subtle::ConstantTimeEq;
use url::Url;

use crate::error::{OAuth2Error, OAuth2Result};

/// Validate a redirect URI presented in an authorization request
///
/// The URI must be absolute and must not contain a fragment (RFC 6749
/// §3.1.2). Matching against the client registration is done separately, by
/// exact string comparison.
///
/// # Errors
///
/// Returns `invalid_request` describing the violation.
pub fn validate_redirect_uri(uri: &str) -> OAuth2Result<()> {
    let parsed = Url::parse(uri)
        .map_err(|e| OAuth2Error::invalid_request(format!("Invalid redirect URI: {e}")))?;

    if parsed.fragment().is_some() {
        return Err(OAuth2Error::invalid_request(
            "The redirect URI must not contain a fragment.",
        ));
    }

    if parsed.cannot_be_a_base() {
        return Err(OAuth2Error::invalid_request(
            "The redirect URI must be an absolute URI.",
        ));
    }

    Ok(())
}

/// Constant-time equality for secrets and verifiers
///
/// Inputs of different length compare unequal; only the length leaks.
pub fn constant_time_eq(expected: &str, received: &str) -> bool {
    bool::from(expected.as_bytes().ct_eq(received.as_bytes()))
}

/// Whether `callback` is safe to use as a JSONP function name
///
/// Accepts dotted JavaScript identifiers (`cb`, `jQuery123.handle`,
/// `$_fn`) and nothing else.
pub fn is_valid_callback_name(callback: &str) -> bool {
    !callback.is_empty()
        && callback.len() <= 128
        && callback.split('.').all(|segment| {
            let mut chars = segment.chars();
            chars
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        })
}
