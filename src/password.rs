//! Argon2id credential hashing and verification.

use anyhow::{anyhow, Result};
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::rngs::OsRng;

/// Hash a plaintext secret with Argon2id and default parameters.
pub fn hash(plain: &str) -> Result<String> {
    hash_with_params(plain, argon2::Params::default())
}

/// Hash a plaintext secret with an explicit cost configuration.
pub fn hash_with_params(plain: &str, params: argon2::Params) -> Result<String> {
    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);
    let salt = SaltString::generate(&mut OsRng);
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash credential: {err}"))?;
    Ok(hash.to_string())
}

/// Verify a plaintext secret against a stored hash.
///
/// A malformed stored hash verifies false rather than erroring; the cost
/// parameters embedded in the hash string are honored.
#[must_use]
pub fn verify(plain: &str, stored_hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(stored_hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::{hash, hash_with_params, verify};

    #[test]
    fn hash_and_verify_round_trip() {
        let stored = hash("correct horse").expect("hash");
        assert!(verify("correct horse", &stored));
        assert!(!verify("battery staple", &stored));
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!verify("anything", "not-a-phc-string"));
        assert!(!verify("anything", ""));
    }

    #[test]
    fn custom_params_are_embedded_and_honored() {
        let params = argon2::Params::new(8 * 1024, 2, 1, None).expect("params");
        let stored = hash_with_params("secret", params).expect("hash");
        assert!(stored.contains("m=8192"));
        assert!(verify("secret", &stored));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let first = hash("secret").expect("hash");
        let second = hash("secret").expect("hash");
        assert_ne!(first, second);
    }
}
