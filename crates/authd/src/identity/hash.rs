//! Password hashing: a BCrypt-style adaptive, self-describing salted hash.
//! Verification is intentionally slow (single-digit milliseconds at the
//! configured cost) — that cost is a security property, not a bug, and is
//! why the verdict cache exists.

use pwhash::bcrypt::{self, BcryptSetup};

/// Hashes `plaintext` at the given cost factor. The returned string is
/// self-describing (embeds cost and salt) and is what gets persisted.
pub fn hash(plaintext: &str, cost: u32) -> Result<String, pwhash::error::Error> {
    bcrypt::hash_with(
        BcryptSetup {
            cost: Some(cost),
            ..Default::default()
        },
        plaintext,
    )
}

/// Verifies `plaintext` against a previously stored hash. Never panics on a
/// malformed hash string — treats it as a verification failure.
pub fn verify(plaintext: &str, stored_hash: &str) -> bool {
    bcrypt::verify(plaintext, stored_hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify_round_trips() {
        let h = hash("s3cret!!", 10).unwrap();
        assert!(verify("s3cret!!", &h));
        assert!(!verify("wrong", &h));
    }

    #[test]
    fn malformed_hash_fails_closed() {
        assert!(!verify("anything", "not-a-real-hash"));
    }

    #[test]
    fn hash_is_self_describing_with_embedded_cost() {
        let h = hash("password", 10).unwrap();
        assert!(h.starts_with("$2"));
    }
}
