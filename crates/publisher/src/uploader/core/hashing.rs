//! Content identity used for dedup against the remote store

use base64::Engine;
use xxhash_rust::xxh64::Xxh64;

/// Seed shared by every identity computation; changing it invalidates all
/// identities already recorded in the store.
const IDENTITY_SEED: u64 = 0;

/// Convert an xxHash64 digest to base64 of its little-endian bytes
fn xxhash64_to_base64(hash: u64) -> String {
    base64::engine::general_purpose::STANDARD.encode(hash.to_le_bytes())
}

/// Compute the content identity of `data`
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Xxh64::new(IDENTITY_SEED);
    hasher.update(data);
    xxhash64_to_base64(hasher.digest())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_stable_and_content_sensitive() {
        assert_eq!(content_hash(b"X"), content_hash(b"X"));
        assert_ne!(content_hash(b"X"), content_hash(b"Y"));
    }

    #[test]
    fn test_identity_matches_one_shot_digest() {
        let data = b"Hello, World!";
        let expected = xxhash64_to_base64(xxhash_rust::xxh64::xxh64(data, 0));
        assert_eq!(content_hash(data), expected);
        // 8 digest bytes encode to 12 base64 characters
        assert_eq!(content_hash(b"").len(), 12);
    }
}
