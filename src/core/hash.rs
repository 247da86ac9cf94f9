//! State Hashing
//!
//! SHA-256 digests used to compare game state across peers:
//! - host/client consistency after a state sync
//! - replay checks over the action log
//!
//! Field order is part of the digest; callers feed fields in a fixed order
//! and iterate BTreeMaps only.

use sha2::{Sha256, Digest};
use super::transform::Vec3;

/// 32-byte digest.
pub type StateHash = [u8; 32];

/// Incremental hasher with a domain prefix.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Start a digest under `domain`.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Digest of a `GameState`.
    pub fn for_game_state() -> Self {
        Self::new(b"SWIFTSHOT_STATE_V1")
    }

    /// Digest of an action log.
    pub fn for_action_log() -> Self {
        Self::new(b"SWIFTSHOT_ACTIONS_V1")
    }

    /// Length-prefixed byte string.
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.update_u64(bytes.len() as u64);
        self.hasher.update(bytes);
    }

    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    #[inline]
    pub fn update_u64(&mut self, value: u64) {
        self.hasher.update(value.to_le_bytes());
    }

    /// f32 by bit pattern, so `-0.0` and `0.0` differ.
    #[inline]
    pub fn update_f32(&mut self, value: f32) {
        self.hasher.update(value.to_bits().to_le_bytes());
    }

    #[inline]
    pub fn update_vec3(&mut self, value: Vec3) {
        value.iter().for_each(|v| self.update_f32(*v));
    }

    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Raw 16-byte identifier.
    #[inline]
    pub fn update_uuid(&mut self, uuid: &[u8; 16]) {
        self.hasher.update(uuid);
    }

    /// Finish the digest.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// First four bytes of a digest as hex, for log lines.
pub fn short_hex(hash: &StateHash) -> String {
    hex::encode(&hash[..4])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest(domain: &[u8], feed: impl Fn(&mut StateHasher)) -> StateHash {
        let mut hasher = StateHasher::new(domain);
        feed(&mut hasher);
        hasher.finalize()
    }

    #[test]
    fn test_same_input_same_digest() {
        let feed = |h: &mut StateHasher| {
            h.update_u32(3);
            h.update_vec3([1.0, 2.0, -3.0]);
            h.update_bool(true);
        };
        assert_eq!(digest(b"d", feed), digest(b"d", feed));
    }

    #[test]
    fn test_field_order_matters() {
        let a = digest(b"d", |h| {
            h.update_u32(1);
            h.update_u32(2);
        });
        let b = digest(b"d", |h| {
            h.update_u32(2);
            h.update_u32(1);
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_domains_differ() {
        let feed = |h: &mut StateHasher| h.update_u64(7);
        assert_ne!(
            digest(b"SWIFTSHOT_STATE_V1", feed),
            digest(b"SWIFTSHOT_ACTIONS_V1", feed)
        );
    }

    #[test]
    fn test_byte_strings_are_length_prefixed() {
        let a = digest(b"d", |h| {
            h.update_bytes(&[1, 2]);
            h.update_bytes(&[3]);
        });
        let b = digest(b"d", |h| {
            h.update_bytes(&[1]);
            h.update_bytes(&[2, 3]);
        });
        assert_ne!(a, b);
    }

    #[test]
    fn test_signed_zero_distinguished() {
        assert_ne!(
            digest(b"d", |h| h.update_f32(0.0)),
            digest(b"d", |h| h.update_f32(-0.0))
        );
    }

    #[test]
    fn test_short_hex() {
        assert_eq!(short_hex(&[0xAB; 32]), "abababab");
    }
}
