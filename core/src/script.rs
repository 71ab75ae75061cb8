//! Payout destination scripts

use crate::hash::Hash256;
use serde::{Deserialize, Serialize};
use std::fmt;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;

/// Opaque script byte sequence used as a payout destination
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Script(pub Vec<u8>);

impl Script {
    pub fn new(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }

    /// Standard 25-byte pay-to-key-hash script for a serialized public key.
    /// The key hash is the first 20 bytes of the key's double SHA-256.
    pub fn pay_to_key_hash(pubkey: &[u8]) -> Self {
        let digest = Hash256::double_sha256(pubkey);
        let mut bytes = Vec::with_capacity(25);
        bytes.push(OP_DUP);
        bytes.push(OP_HASH160);
        bytes.push(20);
        bytes.extend_from_slice(&digest.as_bytes()[..20]);
        bytes.push(OP_EQUALVERIFY);
        bytes.push(OP_CHECKSIG);
        Script(bytes)
    }

    pub fn is_pay_to_key_hash(&self) -> bool {
        self.0.len() == 25
            && self.0[0] == OP_DUP
            && self.0[1] == OP_HASH160
            && self.0[2] == 20
            && self.0[23] == OP_EQUALVERIFY
            && self.0[24] == OP_CHECKSIG
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", hex::encode(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_to_key_hash_size() {
        let script = Script::pay_to_key_hash(&[7u8; 32]);
        assert_eq!(script.len(), 25);
        assert!(script.is_pay_to_key_hash());
    }

    #[test]
    fn test_arbitrary_bytes_are_not_key_hash() {
        let script = Script::new(vec![0u8; 25]);
        assert!(!script.is_pay_to_key_hash());
        assert!(!Script::default().is_pay_to_key_hash());
    }
}
