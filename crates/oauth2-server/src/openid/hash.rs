//! `at_hash` / `c_hash` (OpenID Connect Core §3.3.2.11)
//!
//! Left-most half of the hash of the ASCII value, base64url without
//! padding. The hash function follows the ID Token `alg`: `*256` uses
//! SHA-256, `*384` SHA-384, `*512` SHA-512.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{OAuth2Error, OAuth2Result};

/// Hash of `value` for an ID Token signed with `algorithm`
///
/// # Errors
///
/// Returns an internal error for algorithms without a SHA-2 size suffix.
pub fn token_hash(algorithm: &str, value: &str) -> OAuth2Result<String> {
    let digest = match algorithm.get(2..) {
        Some("256") => Sha256::digest(value.as_bytes()).to_vec(),
        Some("384") => Sha384::digest(value.as_bytes()).to_vec(),
        Some("512") => Sha512::digest(value.as_bytes()).to_vec(),
        _ => {
            return Err(OAuth2Error::internal(format!(
                "No hash function for the algorithm \"{algorithm}\"."
            )));
        }
    };
    Ok(URL_SAFE_NO_PAD.encode(&digest[..digest.len() / 2]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_sizes_follow_algorithm() {
        for (algorithm, bytes) in [("HS256", 16), ("RS384", 24), ("ES512", 32), ("PS256", 16)] {
            let hash = token_hash(algorithm, "token").unwrap();
            assert_eq!(URL_SAFE_NO_PAD.decode(hash).unwrap().len(), bytes, "{algorithm}");
        }
    }

    #[test]
    fn test_known_value() {
        // OpenID Connect Core appendix A.4 (RS256, access token)
        assert_eq!(
            token_hash("RS256", "jHkWEdUXMU1BwAsC4vtUsZwnNvTIxEl0z9K3vx5KF0Y").unwrap(),
            "77QmUPtjPfzWtF2AnpK9RQ"
        );
    }

    #[test]
    fn test_unsupported_algorithm() {
        assert!(token_hash("none", "token").unwrap_err().is_internal());
        assert!(token_hash("EdDSA", "token").is_err());
    }
}
