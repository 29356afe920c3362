//! Signing boundary for JWT artefacts (ID Tokens, JWT access tokens)
//!
//! Key management stays outside this crate: applications construct a
//! [`JwtSigner`] from the keys they manage, or implement [`TokenSigner`]
//! against an HSM/KMS.

use std::collections::HashSet;
use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{OAuth2Error, OAuth2Result};

/// Produces and checks compact JWS values
pub trait TokenSigner: Send + Sync + fmt::Debug {
    /// JWS `alg` value, e.g. `RS256`
    fn algorithm(&self) -> &str;

    /// Sign a claim set
    ///
    /// # Errors
    ///
    /// Returns an internal error when signing fails.
    fn sign(&self, claims: &Map<String, Value>) -> OAuth2Result<String>;

    /// Check the signature and return the claims
    ///
    /// Expiry is not checked here: the token entity's `expires_at` is
    /// authoritative.
    ///
    /// # Errors
    ///
    /// Returns `invalid_token` when the value is not a JWS signed by this key.
    fn verify(&self, token: &str) -> OAuth2Result<Map<String, Value>>;
}

/// [`TokenSigner`] backed by `jsonwebtoken`
pub struct JwtSigner {
    algorithm: Algorithm,
    algorithm_name: String,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtSigner {
    /// Create a signer from a key pair
    pub fn new(algorithm: Algorithm, encoding_key: EncodingKey, decoding_key: DecodingKey) -> Self {
        Self {
            algorithm,
            algorithm_name: format!("{algorithm:?}"),
            key_id: None,
            encoding_key,
            decoding_key,
        }
    }

    /// HMAC signer (`HS256`, `HS384`, `HS512`) from a shared secret
    ///
    /// # Errors
    ///
    /// Returns an internal error for non-HMAC algorithms.
    pub fn hmac(algorithm: Algorithm, secret: &[u8]) -> OAuth2Result<Self> {
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(OAuth2Error::internal(format!(
                "{algorithm:?} is not an HMAC algorithm."
            )));
        }
        Ok(Self::new(
            algorithm,
            EncodingKey::from_secret(secret),
            DecodingKey::from_secret(secret),
        ))
    }

    /// RSA signer (`RS*`, `PS*`) from PEM encoded keys
    ///
    /// # Errors
    ///
    /// Returns an internal error when a key cannot be parsed.
    pub fn rsa_pem(algorithm: Algorithm, private_pem: &[u8], public_pem: &[u8]) -> OAuth2Result<Self> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem)
            .map_err(|e| OAuth2Error::internal(format!("Invalid RSA private key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem)
            .map_err(|e| OAuth2Error::internal(format!("Invalid RSA public key: {e}")))?;
        Ok(Self::new(algorithm, encoding_key, decoding_key))
    }

    /// Set the `kid` header
    #[must_use]
    pub fn with_key_id(mut self, key_id: impl Into<String>) -> Self {
        self.key_id = Some(key_id.into());
        self
    }
}

// Manual Debug impl: key material must not reach logs
impl fmt::Debug for JwtSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtSigner")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .finish_non_exhaustive()
    }
}

impl TokenSigner for JwtSigner {
    fn algorithm(&self) -> &str {
        &self.algorithm_name
    }

    fn sign(&self, claims: &Map<String, Value>) -> OAuth2Result<String> {
        let mut header = Header::new(self.algorithm);
        header.kid.clone_from(&self.key_id);
        encode(&header, claims, &self.encoding_key)
            .map_err(|e| OAuth2Error::internal(format!("Unable to sign the token: {e}")))
    }

    fn verify(&self, token: &str) -> OAuth2Result<Map<String, Value>> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        decode::<Map<String, Value>>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                warn!(error = %e, algorithm = self.algorithm(), "JWT verification failed");
                OAuth2Error::invalid_token("The token signature is invalid.")
            })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn claims() -> Map<String, Value> {
        match json!({"iss": "https://auth.example.com", "sub": "alice", "exp": 1}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_hmac_round_trip_ignores_expiry() {
        let signer = JwtSigner::hmac(Algorithm::HS256, b"0123456789abcdef0123456789abcdef")
            .unwrap()
            .with_key_id("k1");

        let jws = signer.sign(&claims()).unwrap();
        assert_eq!(jws.split('.').count(), 3);

        let decoded = signer.verify(&jws).unwrap();
        assert_eq!(decoded["sub"], "alice");
        assert_eq!(signer.algorithm(), "HS256");
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let signer = JwtSigner::hmac(Algorithm::HS256, b"key-one-key-one-key-one-key-one!").unwrap();
        let other = JwtSigner::hmac(Algorithm::HS256, b"key-two-key-two-key-two-key-two!").unwrap();

        let jws = other.sign(&claims()).unwrap();
        assert_eq!(
            signer.verify(&jws).unwrap_err().code,
            crate::error::ErrorCode::InvalidToken
        );
        assert!(signer.verify("not-a-jwt").is_err());
    }

    #[test]
    fn test_hmac_rejects_asymmetric_algorithm() {
        assert!(JwtSigner::hmac(Algorithm::RS256, b"secret").is_err());
    }

    #[test]
    fn test_debug_hides_keys() {
        let signer = JwtSigner::hmac(Algorithm::HS512, b"very-secret").unwrap();
        assert!(!format!("{signer:?}").contains("very-secret"));
    }
}
