//! ID and opaque token generation with prefix support
//!
//! Prefixed IDs carry at least 96 bits of entropy and are URL-safe.
//! Opaque tokens (refresh tokens) are generated with 256 bits of entropy.

use base64::{Engine, prelude::BASE64_URL_SAFE_NO_PAD};
use rand::{TryRngCore, rngs::OsRng};

/// Generate a prefixed ID with at least 96 bits of entropy
///
/// The ID format is: `{prefix}_{random_string}`
/// Where the random string is base64 URL-safe encoded without padding.
pub fn generate_prefixed_id(prefix: &str) -> String {
    // 12 bytes (96 bits) of random data
    let mut bytes = [0u8; 12];
    OsRng.try_fill_bytes(&mut bytes).unwrap();

    let encoded = BASE64_URL_SAFE_NO_PAD.encode(bytes);

    format!("{prefix}_{encoded}")
}

/// Generate an opaque token with 256 bits of entropy
///
/// Used for refresh tokens, which are never parsed and only compared
/// for exact equality against the stored credential pair.
pub fn generate_opaque_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.try_fill_bytes(&mut bytes).unwrap();
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// Validate that a prefixed ID has the expected format
pub fn validate_prefixed_id(id: &str, expected_prefix: &str) -> bool {
    if !id.starts_with(&format!("{expected_prefix}_")) {
        return false;
    }

    let random_part = &id[expected_prefix.len() + 1..];

    match BASE64_URL_SAFE_NO_PAD.decode(random_part) {
        Ok(decoded) => decoded.len() >= 12, // At least 96 bits
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_prefixed_id() {
        let id = generate_prefixed_id("usr");
        assert!(id.starts_with("usr_"));
        assert!(id.len() > 4);

        // Ensure uniqueness
        let id2 = generate_prefixed_id("usr");
        assert_ne!(id, id2);
    }

    #[test]
    fn test_generate_opaque_token() {
        let token = generate_opaque_token();
        let decoded = BASE64_URL_SAFE_NO_PAD.decode(&token).unwrap();
        assert_eq!(decoded.len(), 32);

        assert_ne!(token, generate_opaque_token());
    }

    #[test]
    fn test_validate_prefixed_id() {
        let id = generate_prefixed_id("usr");
        assert!(validate_prefixed_id(&id, "usr"));
        assert!(!validate_prefixed_id(&id, "tok"));

        assert!(!validate_prefixed_id("usr", "usr"));
        assert!(!validate_prefixed_id("usr_", "usr"));
        assert!(!validate_prefixed_id("usr_invalid!", "usr"));
    }

    #[test]
    fn test_id_is_url_safe() {
        let id = generate_prefixed_id("usr");
        assert!(
            id.chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '-')
        );
    }
}
