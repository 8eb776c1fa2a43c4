//! Structural hashing for merge decisions.
//!
//! A merged group is keyed by the digest of everything that changes the
//! generated code: model identity, shape class, parameter lists and
//! variable references. Collisions of the 256-bit digest are negligible,
//! so equal digests are treated as structurally identical groups.

use std::fmt;

/// A 256-bit structural digest.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(pub [u8; 32]);

impl ContentHash {
    /// Hex string (full 64 chars).
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Short hex string (first 8 bytes, 16 chars).
    pub fn to_short(&self) -> String {
        self.0[..8].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_short())
    }
}

/// Order-sensitive incremental hasher.
///
/// Every variable-length item is length-prefixed so that adjacent fields
/// cannot alias (`["ab", "c"]` and `["a", "bc"]` hash differently).
pub struct StructuralHasher {
    inner: blake3::Hasher,
}

impl Default for StructuralHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }

    pub fn update_u8(&mut self, value: u8) -> &mut Self {
        self.inner.update(&[value]);
        self
    }

    pub fn update_u32(&mut self, value: u32) -> &mut Self {
        self.inner.update(&value.to_le_bytes());
        self
    }

    pub fn update_u64(&mut self, value: u64) -> &mut Self {
        self.inner.update(&value.to_le_bytes());
        self
    }

    pub fn update_bool(&mut self, value: bool) -> &mut Self {
        self.update_u8(value as u8)
    }

    pub fn update_f64(&mut self, value: f64) -> &mut Self {
        self.inner.update(&value.to_bits().to_le_bytes());
        self
    }

    pub fn update_str(&mut self, value: &str) -> &mut Self {
        self.update_u64(value.len() as u64);
        self.inner.update(value.as_bytes());
        self
    }

    pub fn update_strs<S: AsRef<str>>(&mut self, values: &[S]) -> &mut Self {
        self.update_u64(values.len() as u64);
        for value in values {
            self.update_str(value.as_ref());
        }
        self
    }

    pub fn update_digest(&mut self, digest: &ContentHash) -> &mut Self {
        self.inner.update(&digest.0);
        self
    }

    pub fn finish(&self) -> ContentHash {
        ContentHash(*self.inner.finalize().as_bytes())
    }
}
