//! 256-bit digests

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Fixed 32-byte digest used for block hashes, txids and content checksums
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Double SHA-256 of arbitrary bytes
    pub fn double_sha256(data: &[u8]) -> Self {
        let first = Sha256::digest(data);
        let second = Sha256::digest(first);
        Hash256(second.into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Compact 32-bit encoding of the 256-bit big-endian value
    /// (exponent byte followed by a 3-byte mantissa)
    pub fn compact(&self) -> u32 {
        let bytes = self.0;
        let mut size: u32 = 32;
        let mut i = 0usize;
        while i < 32 && bytes[i] == 0 {
            i += 1;
            size -= 1;
        }
        let mut mantissa: u32 = 0;
        for j in 0..3 {
            mantissa <<= 8;
            if i + j < 32 {
                mantissa |= bytes[i + j] as u32;
            }
        }
        if mantissa & 0x0080_0000 != 0 {
            mantissa >>= 8;
            size += 1;
        }
        (size << 24) | mantissa
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", hex::encode(self.0))
    }
}
