//! Ember Cryptography
//!
//! Signature generation and verification for signed network messages

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Magic prefix mixed into every signed message digest
pub const MESSAGE_MAGIC: &[u8] = b"Ember Signed Message:\n";

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid public key")]
    InvalidPublicKey,

    #[error("Invalid private key")]
    InvalidPrivateKey,
}

/// How the message digest of a signed network message is composed.
///
/// `Legacy` signs the human-readable concatenated message string;
/// `SignatureHash` signs the hex rendering of a structured content hash.
/// Both remain accepted; the signer picks by upgrade activation height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageFormat {
    Legacy,
    SignatureHash,
}

/// Key pair for signing masternode messages
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate new random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Get public key as serialized bytes
    pub fn public_key(&self) -> Vec<u8> {
        self.verifying_key.as_bytes().to_vec()
    }

    /// Get public key as hex string
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.verifying_key.as_bytes())
    }

    /// Create keypair from private key hex
    pub fn from_private_key_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str).map_err(|_| CryptoError::InvalidPrivateKey)?;

        let key_bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CryptoError::InvalidPrivateKey)?;

        let signing_key = SigningKey::from_bytes(&key_bytes);
        let verifying_key = signing_key.verifying_key();

        Ok(Self {
            signing_key,
            verifying_key,
        })
    }

    /// Sign a message: the magic-prefixed double SHA-256 digest is signed
    pub fn sign_message(&self, message: &[u8]) -> Vec<u8> {
        let digest = message_digest(message);
        self.signing_key.sign(&digest).to_bytes().to_vec()
    }
}

/// Verify a message signature against a serialized public key
pub fn verify_message(
    public_key: &[u8],
    signature_bytes: &[u8],
    message: &[u8],
) -> Result<(), CryptoError> {
    let pub_key_array: [u8; 32] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidPublicKey)?;

    let verifying_key =
        VerifyingKey::from_bytes(&pub_key_array).map_err(|_| CryptoError::InvalidPublicKey)?;

    let sig_array: [u8; 64] = signature_bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature)?;

    let signature = Signature::from_bytes(&sig_array);

    let digest = message_digest(message);
    verifying_key
        .verify(&digest, &signature)
        .map_err(|_| CryptoError::InvalidSignature)
}

/// Magic-prefixed double SHA-256 digest of a message
fn message_digest(message: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(MESSAGE_MAGIC);
    hasher.update(message);
    let first = hasher.finalize();
    let second = Sha256::digest(first);
    second.into()
}
