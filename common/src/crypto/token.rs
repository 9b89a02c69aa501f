// Control token issuance and verification for externally-attached agents.
//
// The raw token is handed out exactly once at registration; only its SHA-256
// digest is retained. Every comparison over token material is constant-time:
// inputs are hashed to a fixed width first, so even length-differing inputs
// cost the same amount of work.

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::CONTROL_TOKEN_SIZE;

/// SHA-256 digest of a control token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHash(#[serde(with = "hex::serde")] [u8; 32]);

impl TokenHash {
    pub fn of(raw: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(raw.as_bytes());
        TokenHash(hasher.finalize().into())
    }

    pub fn ct_matches(&self, other: &TokenHash) -> bool {
        self.0.ct_eq(&other.0).into()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

// 256-bit cryptographically random token, hex encoded
pub fn generate_control_token() -> String {
    let mut bytes = [0u8; CONTROL_TOKEN_SIZE];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub fn hash_token(raw: &str) -> TokenHash {
    TokenHash::of(raw)
}

// Constant-time equality over arbitrary byte strings.
// Both sides are compressed to SHA-256 digests so the comparison does a fixed
// amount of work regardless of input lengths, and never short-circuits.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    let da: [u8; 32] = Sha256::digest(a).into();
    let db: [u8; 32] = Sha256::digest(b).into();
    da.ct_eq(&db).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_is_unique_and_hex() {
        let a = generate_control_token();
        let b = generate_control_token();
        assert_eq!(a.len(), CONTROL_TOKEN_SIZE * 2);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn hash_matches_only_same_token() {
        let raw = generate_control_token();
        assert!(hash_token(&raw).ct_matches(&TokenHash::of(&raw)));
        assert!(!hash_token(&raw).ct_matches(&TokenHash::of("other")));
    }

    #[test]
    fn ct_eq_handles_length_mismatch() {
        assert!(constant_time_eq(b"same", b"same"));
        assert!(!constant_time_eq(b"short", b"much longer input"));
    }
}
