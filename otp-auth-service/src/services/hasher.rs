//! Salted one-way hashing for passcodes.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

const SALT_LEN: usize = 16;

/// Hash a code as `"<hex salt>:<hex sha256(salt || code)>"`.
///
/// The salt enters the digest in its hex form.
pub fn hash_code(code: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let salt = hex::encode(salt);
    let digest = digest(&salt, code);
    format!("{}:{}", salt, digest)
}

/// Check `candidate` against a stored hash in constant time.
///
/// Malformed stored values never verify.
pub fn verify_code(candidate: &str, stored: &str) -> bool {
    let Some((salt, expected)) = stored.split_once(':') else {
        return false;
    };
    if salt.is_empty() || expected.is_empty() {
        return false;
    }

    let actual = digest(salt, candidate);
    actual.as_bytes().ct_eq(expected.as_bytes()).into()
}

fn digest(salt: &str, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_verifies_original_code() {
        let stored = hash_code("123456");
        assert!(verify_code("123456", &stored));
        assert!(!verify_code("654321", &stored));
    }

    #[test]
    fn same_code_hashes_differently() {
        assert_ne!(hash_code("123456"), hash_code("123456"));
    }

    #[test]
    fn stored_value_does_not_contain_code() {
        let stored = hash_code("987123");
        assert!(!stored.contains("987123"));
        let (salt, digest) = stored.split_once(':').unwrap();
        assert_eq!(salt.len(), SALT_LEN * 2);
        assert_eq!(digest.len(), 64);
    }

    #[test]
    fn malformed_hash_never_matches() {
        assert!(!verify_code("123456", ""));
        assert!(!verify_code("123456", "no-separator"));
        assert!(!verify_code("123456", ":"));
        assert!(!verify_code("123456", "abcd:"));
    }
}
