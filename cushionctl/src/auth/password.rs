//! Password hashing and verification.
//!
//! Digests are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`), so the salt and cost
//! parameters travel with every stored hash. Raising the configured cost only affects new hashes.

use std::sync::OnceLock;

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;

use crate::{config::PasswordConfig, errors::Error};

/// Argon2 hashing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Params {
    /// Create Argon2 instance with these parameters.
    fn to_argon2(self) -> Result<Argon2<'static>, Error> {
        let params = Params::new(self.memory_kib, self.iterations, self.parallelism, None).map_err(|e| Error::Internal {
            operation: format!("create argon2 params: {e}"),
        })?;

        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Check the parameters are accepted by argon2 without hashing anything.
    pub fn check(self) -> Result<(), Error> {
        self.to_argon2().map(|_| ())
    }
}

impl Default for Argon2Params {
    /// Secure defaults for production (Argon2id RFC recommendations)
    fn default() -> Self {
        Self {
            memory_kib: 19456, // 19 MB
            iterations: 2,
            parallelism: 1,
        }
    }
}

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str, params: Argon2Params) -> Result<String, Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = params.to_argon2()?;

    let hash = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| Error::Internal {
        operation: format!("hash password: {e}"),
    })?;

    Ok(hash.to_string())
}

/// Verify a password against a stored digest.
///
/// Verification uses the parameters embedded in the digest. A malformed digest never matches.
pub fn verify_password(password: &str, digest: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(digest) else {
        return false;
    };
    Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
}

/// Hash on the blocking pool so the async runtime is never stalled by argon2.
pub async fn hash_password_blocking(password: String, params: Argon2Params) -> Result<String, Error> {
    tokio::task::spawn_blocking(move || hash_password(&password, params))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })?
}

/// Verify on the blocking pool. Errors only if the blocking task itself fails.
pub async fn verify_password_blocking(password: String, digest: String) -> Result<bool, Error> {
    tokio::task::spawn_blocking(move || verify_password(&password, &digest))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })
}

/// Digest used to burn the same verification cost when a login names an unknown email.
pub fn dummy_digest(params: Argon2Params) -> Result<String, Error> {
    static DUMMY: OnceLock<String> = OnceLock::new();
    if let Some(digest) = DUMMY.get() {
        return Ok(digest.clone());
    }
    let digest = hash_password(&generate_token(), params)?;
    Ok(DUMMY.get_or_init(|| digest).clone())
}

/// Check a candidate password against the configured length policy.
pub fn check_policy(password: &str, policy: &PasswordConfig) -> Result<(), Error> {
    let length = password.chars().count();
    if length < policy.min_length {
        return Err(Error::validation(
            "password",
            format!("Password must be at least {} characters", policy.min_length),
        ));
    }
    if length > policy.max_length {
        return Err(Error::validation(
            "password",
            format!("Password must be at most {} characters", policy.max_length),
        ));
    }
    Ok(())
}

/// Generate a secure random token: 32 bytes of OS randomness, base64url without padding.
pub fn generate_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> Argon2Params {
        Argon2Params {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_password_hashing() {
        let input = "test_password_123";
        let hash = hash_password(input, Argon2Params::default()).unwrap();

        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password(input, &hash));
        assert!(!verify_password("wrong_password", &hash));
    }

    #[test]
    fn test_same_input_different_hashes() {
        let input = "same_password";

        let hash1 = hash_password(input, fast_params()).unwrap();
        let hash2 = hash_password(input, fast_params()).unwrap();

        // Same input should produce different hashes due to salt
        assert_ne!(hash1, hash2);

        assert!(verify_password(input, &hash1));
        assert!(verify_password(input, &hash2));
    }

    #[test]
    fn test_digest_from_other_params_still_verifies() {
        let hash = hash_password("secret1", fast_params()).unwrap();
        let stronger = Argon2Params {
            memory_kib: 4096,
            iterations: 3,
            parallelism: 1,
        };
        assert!(stronger.check().is_ok());
        // Verification reads the cost from the digest, not from configuration
        assert!(verify_password("secret1", &hash));
    }

    #[test]
    fn test_malformed_digest_is_false() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", "$argon2id$v=19$garbage"));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = Argon2Params {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        };
        assert!(params.check().is_err());
        assert!(hash_password("x", params).is_err());
    }

    #[test]
    fn test_policy() {
        let policy = PasswordConfig::default();
        assert!(check_policy("secret1", &policy).is_ok());
        let err = check_policy("abc", &policy).unwrap_err();
        assert_eq!(err.field().as_deref(), Some("password"));
        assert!(check_policy(&"x".repeat(policy.max_length + 1), &policy).is_err());
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_ne!(token1, token2);

        // 43 chars for 32 bytes, base64url alphabet, no padding
        assert_eq!(token1.len(), 43);
        assert!(token1.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        assert!(!token1.contains('='));
    }

    #[tokio::test]
    async fn test_blocking_wrappers() {
        let hash = hash_password_blocking("secret1".to_string(), fast_params()).await.unwrap();
        assert!(verify_password_blocking("secret1".to_string(), hash.clone()).await.unwrap());
        assert!(!verify_password_blocking("secret2".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_dummy_digest_is_stable() {
        let first = dummy_digest(fast_params()).unwrap();
        let second = dummy_digest(fast_params()).unwrap();
        assert_eq!(first, second);
        assert!(!verify_password("", &first));
    }
}
