//! API key generation and hashing.
//!
//! Plain keys are shown once at creation and never stored; the database
//! keeps the lowercase hex SHA-256 digest and lookups hash the presented key.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Prefix carried by every generated key.
pub const API_KEY_PREFIX: &str = "sk-speedcal-";

const KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const KEY_RANDOM_LEN: usize = 40;

/// Lowercase hex SHA-256 digest of `content`.
pub fn sha256_hex(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{:x}", digest)
}

/// Generate a fresh random API key.
pub fn generate_api_key() -> String {
    let mut rng = rand::rng();
    let random: String = (0..KEY_RANDOM_LEN)
        .map(|_| {
            let idx = rng.random_range(0..KEY_CHARSET.len());
            KEY_CHARSET[idx] as char
        })
        .collect();
    format!("{API_KEY_PREFIX}{random}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        // SHA-256 of empty string
        assert_eq!(
            sha256_hex(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sha256_hex_is_lowercase() {
        let hash = sha256_hex("sk-speedcal-abc");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_generated_keys_are_unique_and_prefixed() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a, b);
        assert!(a.starts_with(API_KEY_PREFIX));
        assert_eq!(a.len(), API_KEY_PREFIX.len() + KEY_RANDOM_LEN);
        assert!(a[API_KEY_PREFIX.len()..].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
