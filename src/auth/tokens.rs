//! Opaque refresh token values and their storage digests.

use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};

pub const REFRESH_TOKEN_LENGTH: usize = 64;

/// 64 random alphanumeric characters from the thread-local CSPRNG.
pub fn generate_refresh_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFRESH_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Lowercase hex SHA-256 of the raw value. This is what gets persisted.
pub fn hash_token(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

/// Compares two secrets in time independent of where they differ.
/// Both sides are digested first so their lengths never leak either.
pub fn secrets_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());

    provided
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_long_alphanumeric_and_distinct() {
        let first = generate_refresh_token();
        let second = generate_refresh_token();

        assert_eq!(first.len(), REFRESH_TOKEN_LENGTH);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first, second);
    }

    #[test]
    fn hash_is_stable_hex_and_differs_from_input() {
        let raw = generate_refresh_token();
        let hash = hash_token(&raw);

        assert_eq!(hash, hash_token(&raw));
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(hash, raw);
    }

    #[test]
    fn known_digest() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn secrets_match_only_on_equal_input() {
        assert!(secrets_match("cron-secret", "cron-secret"));
        assert!(!secrets_match("cron-secret", "cron-secreT"));
        assert!(!secrets_match("", "cron-secret"));
        assert!(!secrets_match("cron-secret-but-longer", "cron-secret"));
    }
}
