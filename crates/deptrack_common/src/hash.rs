//! 128-bit content hashing for interface fingerprints and record integrity.

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh3::Xxh3;

/// A 128-bit content hash computed using XXH3.
///
/// Two entities with the same `ContentHash` over their interface text are
/// assumed to expose the same interface. Records carry these hashes so a build
/// driver can tell which providers changed between runs.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Computes a content hash from a byte slice using XXH3-128.
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_128(data);
        Self(hash.to_le_bytes())
    }

    /// Parses the 32-character lowercase hex form produced by `Display`.
    ///
    /// Returns `None` for anything that is not exactly 32 hex digits.
    pub fn parse_hex(text: &str) -> Option<Self> {
        if text.len() != 32 || !text.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&text[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:02x}{:02x}..)", self.0[0], self.0[1])
    }
}

/// Streaming builder for a [`ContentHash`] over several fields.
///
/// Every field is length-prefixed, so `("ab", "c")` and `("a", "bc")` hash
/// differently.
pub struct ContentHasher {
    inner: Xxh3,
}

impl ContentHasher {
    /// Creates a hasher with the default XXH3 seed.
    pub fn new() -> Self {
        Self { inner: Xxh3::new() }
    }

    /// Feeds a string field.
    pub fn write_str(&mut self, field: &str) -> &mut Self {
        self.inner.update(&(field.len() as u64).to_le_bytes());
        self.inner.update(field.as_bytes());
        self
    }

    /// Feeds a small integer tag.
    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.inner.update(&value.to_le_bytes());
        self
    }

    /// Feeds a previously computed hash.
    pub fn write_hash(&mut self, hash: ContentHash) -> &mut Self {
        self.inner.update(&hash.0);
        self
    }

    /// Returns the hash of everything written so far.
    pub fn finish(&self) -> ContentHash {
        ContentHash(self.inner.digest128().to_le_bytes())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = ContentHash::from_bytes(b"var v: String");
        let b = ContentHash::from_bytes(b"var v: String");
        assert_eq!(a, b);
    }

    #[test]
    fn different_inputs_differ() {
        let a = ContentHash::from_bytes(b"var v: String");
        let b = ContentHash::from_bytes(b"var v: Int");
        assert_ne!(a, b);
    }

    #[test]
    fn display_format() {
        let h = ContentHash::from_bytes(b"test");
        let s = format!("{h}");
        assert_eq!(s.len(), 32, "Display should be 32 hex chars");
        assert!(s.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn parse_hex_roundtrip() {
        let h = ContentHash::from_bytes(b"fingerprint");
        assert_eq!(ContentHash::parse_hex(&h.to_string()), Some(h));
    }

    #[test]
    fn parse_hex_rejects_garbage() {
        assert_eq!(ContentHash::parse_hex(""), None);
        assert_eq!(ContentHash::parse_hex("zz"), None);
        assert_eq!(ContentHash::parse_hex(&"g".repeat(32)), None);
    }

    #[test]
    fn debug_abbreviated() {
        let h = ContentHash::from_bytes(b"test");
        let s = format!("{h:?}");
        assert!(s.starts_with("ContentHash("));
        assert!(s.ends_with(")"));
    }

    #[test]
    fn hasher_fields_are_length_prefixed() {
        let a = ContentHasher::new().write_str("ab").write_str("c").finish();
        let b = ContentHasher::new().write_str("a").write_str("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn hasher_is_deterministic() {
        let seed = ContentHash::from_bytes(b"seed");
        let a = ContentHasher::new().write_u32(3).write_hash(seed).finish();
        let b = ContentHasher::new().write_u32(3).write_hash(seed).finish();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_roundtrip() {
        let h = ContentHash::from_bytes(b"serde test");
        let json = serde_json::to_string(&h).unwrap();
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(h, back);
    }
}
