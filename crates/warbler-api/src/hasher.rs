use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version,
    password_hash::SaltString,
};
use rand_core::OsRng;

use crate::error::{Error, Result};

/// One-way password hashing.
pub trait CredentialHasher: Send + Sync {
    /// Produce a salted digest. Callers never pass an empty secret.
    fn hash(&self, plaintext: &str) -> Result<String>;

    /// Whether `plaintext` matches `digest`. Malformed digests do not match.
    fn verify(&self, plaintext: &str, digest: &str) -> bool;
}

/// Argon2id with a random salt per digest, stored as a PHC string.
#[derive(Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self {
            params: Params::default(),
        }
    }

    /// Custom cost parameters: memory in KiB, passes, lanes.
    pub fn with_params(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| Error::Hash(e.to_string()))?;
        Ok(Self { params })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let digest = self
            .argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| Error::Hash(e.to_string()))?
            .to_string();
        Ok(digest)
    }

    fn verify(&self, plaintext: &str, digest: &str) -> bool {
        // Cost parameters come from the digest itself.
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };
        self.argon2()
            .verify_password(plaintext.as_bytes(), &parsed)
            .is_ok()
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Argon2Hasher {
    // Smallest legal cost; keeps the suite fast.
    Argon2Hasher::with_params(8, 1, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_salted_and_verifies() {
        let hasher = test_hasher();
        let a = hasher.hash("password").unwrap();
        let b = hasher.hash("password").unwrap();

        assert_ne!(a, "password");
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$"));
        assert!(hasher.verify("password", &a));
        assert!(hasher.verify("password", &b));
        assert!(!hasher.verify("Password", &a));
    }

    #[test]
    fn malformed_digest_does_not_verify() {
        let hasher = test_hasher();
        assert!(!hasher.verify("password", "HASHED_PASSWORD"));
        assert!(!hasher.verify("password", ""));
        assert!(!hasher.verify("", "$argon2id$v=19$m=8,t=1,p=1$garbage"));
    }

    #[test]
    fn verify_uses_digest_parameters() {
        let cheap = test_hasher();
        let other = Argon2Hasher::with_params(16, 2, 1).unwrap();
        let digest = cheap.hash("secret").unwrap();
        assert!(other.verify("secret", &digest));
    }

    #[test]
    fn rejects_invalid_params() {
        assert!(matches!(Argon2Hasher::with_params(0, 0, 0), Err(Error::Hash(_))));
    }
}
