//! Proof Key for Code Exchange (RFC 7636)
//!
//! Verification is the server half of PKCE: the authorization request
//! carries `code_challenge` / `code_challenge_method`, the token request the
//! `code_verifier`.

use std::fmt::Debug;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::{OAuth2Error, OAuth2Result};
use crate::validation::constant_time_eq;

/// A `code_challenge_method`
pub trait PkceMethod: Send + Sync + Debug {
    /// Method name (`plain`, `S256`)
    fn name(&self) -> &str;

    /// Whether `code_verifier` matches `code_challenge`
    fn is_challenge_verified(&self, code_verifier: &str, code_challenge: &str) -> bool;
}

/// `plain`: the challenge is the verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct Plain;

impl PkceMethod for Plain {
    fn name(&self) -> &str {
        "plain"
    }

    fn is_challenge_verified(&self, code_verifier: &str, code_challenge: &str) -> bool {
        constant_time_eq(code_challenge, code_verifier)
    }
}

/// `S256`: `BASE64URL(SHA256(ASCII(code_verifier)))` without padding
#[derive(Debug, Clone, Copy, Default)]
pub struct S256;

impl S256 {
    /// Compute the challenge for a verifier
    pub fn challenge(code_verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(code_verifier.as_bytes()))
    }
}

impl PkceMethod for S256 {
    fn name(&self) -> &str {
        "S256"
    }

    fn is_challenge_verified(&self, code_verifier: &str, code_challenge: &str) -> bool {
        constant_time_eq(code_challenge, &Self::challenge(code_verifier))
    }
}

/// Registry of supported challenge methods
#[derive(Debug, Default)]
pub struct PkceMethodManager {
    methods: Vec<Arc<dyn PkceMethod>>,
}

impl PkceMethodManager {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `plain` and `S256`
    pub fn with_default_methods() -> Self {
        let mut manager = Self::new();
        manager.add(Arc::new(Plain));
        manager.add(Arc::new(S256));
        manager
    }

    /// Register a method, replacing one with the same name
    pub fn add(&mut self, method: Arc<dyn PkceMethod>) {
        self.methods.retain(|m| m.name() != method.name());
        self.methods.push(method);
    }

    /// Whether `name` is registered
    pub fn has(&self, name: &str) -> bool {
        self.methods.iter().any(|m| m.name() == name)
    }

    /// Look up a method
    ///
    /// # Errors
    ///
    /// Returns an internal error for unregistered names; validate client
    /// input with [`has`](Self::has) first.
    pub fn get(&self, name: &str) -> OAuth2Result<Arc<dyn PkceMethod>> {
        self.methods
            .iter()
            .find(|m| m.name() == name)
            .cloned()
            .ok_or_else(|| {
                OAuth2Error::internal(format!("The challenge method \"{name}\" is not supported."))
            })
    }

    /// Registered method names, in registration order
    pub fn names(&self) -> Vec<&str> {
        self.methods.iter().map(|m| m.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain() {
        assert!(Plain.is_challenge_verified("abc", "abc"));
        assert!(!Plain.is_challenge_verified("abd", "abc"));
    }

    #[test]
    fn test_s256_rfc7636_appendix_b() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        let challenge = "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM";

        assert_eq!(S256::challenge(verifier), challenge);
        assert!(S256.is_challenge_verified(verifier, challenge));
        assert!(!S256.is_challenge_verified("wrong", challenge));
    }

    #[test]
    fn test_manager() {
        let manager = PkceMethodManager::with_default_methods();

        assert_eq!(manager.names(), vec!["plain", "S256"]);
        assert!(manager.has("S256"));
        assert!(!manager.has("S512"));
        assert!(manager.get("S512").unwrap_err().is_internal());
        assert_eq!(manager.get("plain").unwrap().name(), "plain");
    }
}
