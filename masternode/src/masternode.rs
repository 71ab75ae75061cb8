//! Masternode records and their signed network messages

use crate::{MASTERNODE_EXPIRATION_SECONDS, MASTERNODE_MIN_MNP_SECONDS, MASTERNODE_REMOVAL_SECONDS};
use ember_core::{Hash256, MONTH_IN_SECONDS, OutPoint, Script, TxIn};
use ember_crypto::{KeyPair, MessageFormat};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MasternodeState {
    PreEnabled,
    Enabled,
    Expired,
    Removed,
    VinSpent,
}

impl fmt::Display for MasternodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreEnabled => write!(f, "PRE_ENABLED"),
            Self::Enabled => write!(f, "ENABLED"),
            Self::Expired => write!(f, "EXPIRED"),
            Self::Removed => write!(f, "REMOVED"),
            Self::VinSpent => write!(f, "VIN_SPENT"),
        }
    }
}

/// Signed liveness message referencing a recent main-chain block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    pub vin: TxIn,
    pub block_hash: Hash256,
    pub sig_time: i64,
    pub signature: Vec<u8>,
    pub format: MessageFormat,
}

impl Ping {
    pub fn new(outpoint: OutPoint, block_hash: Hash256, sig_time: i64) -> Self {
        Ping {
            vin: TxIn::new(outpoint),
            block_hash,
            sig_time,
            signature: Vec::new(),
            format: MessageFormat::SignatureHash,
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        self.vin.prevout
    }

    /// Content hash; the runtime salt perturbs it so the seen-map can be
    /// rolled over remotely
    pub fn hash(&self, salt: i64) -> Hash256 {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(self.vin.prevout.txid.as_bytes());
        bytes.extend_from_slice(&self.vin.prevout.vout.to_le_bytes());
        if self.format == MessageFormat::SignatureHash {
            bytes.extend_from_slice(self.block_hash.as_bytes());
        }
        bytes.extend_from_slice(&self.sig_time.to_le_bytes());
        if salt > 0 {
            bytes.extend_from_slice(&salt.to_le_bytes());
        }
        Hash256::double_sha256(&bytes)
    }

    /// The byte message the signature commits to, in the given format
    fn message(&self, format: MessageFormat, salt: i64) -> Vec<u8> {
        match format {
            MessageFormat::SignatureHash => self.hash(salt).to_string().into_bytes(),
            MessageFormat::Legacy => {
                let mut message = format!(
                    "{}{}{}",
                    self.vin.prevout, self.block_hash, self.sig_time
                );
                if salt > 0 {
                    message.push_str(&salt.to_string());
                }
                message.into_bytes()
            }
        }
    }

    pub fn sign(&mut self, keypair: &KeyPair, format: MessageFormat, salt: i64) {
        self.format = format;
        self.signature = keypair.sign_message(&self.message(format, salt));
    }

    /// Accepts either message format; the declared one is tried first
    pub fn verify(&self, operator_pubkey: &[u8], salt: i64) -> bool {
        let declared = self.message(self.format, salt);
        if ember_crypto::verify_message(operator_pubkey, &self.signature, &declared).is_ok() {
            return true;
        }
        let other = match self.format {
            MessageFormat::Legacy => MessageFormat::SignatureHash,
            MessageFormat::SignatureHash => MessageFormat::Legacy,
        };
        ember_crypto::verify_message(operator_pubkey, &self.signature, &self.message(other, salt))
            .is_ok()
    }
}

/// Masternode self-advertisement: address, keys and the initial ping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announce {
    pub vin: TxIn,
    pub addr: SocketAddr,
    pub collateral_pubkey: Vec<u8>,
    pub operator_pubkey: Vec<u8>,
    pub protocol_version: u32,
    pub sig_time: i64,
    pub signature: Vec<u8>,
    pub format: MessageFormat,
    pub last_ping: Ping,
}

/// Seen-map hash of a broadcast with the given announce time and key
pub(crate) fn broadcast_hash(sig_time: i64, collateral_pubkey: &[u8]) -> Hash256 {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&sig_time.to_le_bytes());
    bytes.extend_from_slice(collateral_pubkey);
    Hash256::double_sha256(&bytes)
}

impl Announce {
    /// Identifies this broadcast in the seen-map
    pub fn hash(&self) -> Hash256 {
        broadcast_hash(self.sig_time, &self.collateral_pubkey)
    }

    /// Rebuild the broadcast for a registry entry, for relaying list
    /// responses. Entries without a ping cannot be rebroadcast.
    pub fn from_masternode(mn: &Masternode) -> Option<Self> {
        Some(Announce {
            vin: mn.vin.clone(),
            addr: mn.addr,
            collateral_pubkey: mn.collateral_pubkey.clone(),
            operator_pubkey: mn.operator_pubkey.clone(),
            protocol_version: mn.protocol_version,
            sig_time: mn.sig_time,
            signature: mn.signature.clone(),
            format: mn.format,
            last_ping: mn.last_ping.clone()?,
        })
    }

    /// Structured content hash signed by the hash message format
    fn signature_hash(&self) -> Hash256 {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(self.addr.to_string().as_bytes());
        bytes.extend_from_slice(&self.sig_time.to_le_bytes());
        bytes.extend_from_slice(&self.collateral_pubkey);
        bytes.extend_from_slice(&self.operator_pubkey);
        bytes.extend_from_slice(&self.protocol_version.to_le_bytes());
        Hash256::double_sha256(&bytes)
    }

    fn message(&self, format: MessageFormat) -> Vec<u8> {
        match format {
            MessageFormat::SignatureHash => self.signature_hash().to_string().into_bytes(),
            MessageFormat::Legacy => format!(
                "{}{}{}{}{}",
                self.addr,
                self.sig_time,
                hex::encode(&self.collateral_pubkey),
                hex::encode(&self.operator_pubkey),
                self.protocol_version
            )
            .into_bytes(),
        }
    }

    /// Signed with the collateral key
    pub fn sign(&mut self, collateral_key: &KeyPair, format: MessageFormat) {
        self.format = format;
        self.signature = collateral_key.sign_message(&self.message(format));
    }

    /// Accepts either message format; the declared one is tried first
    pub fn verify_signature(&self) -> bool {
        let declared = self.message(self.format);
        if ember_crypto::verify_message(&self.collateral_pubkey, &self.signature, &declared).is_ok()
        {
            return true;
        }
        let other = match self.format {
            MessageFormat::Legacy => MessageFormat::SignatureHash,
            MessageFormat::SignatureHash => MessageFormat::Legacy,
        };
        ember_crypto::verify_message(&self.collateral_pubkey, &self.signature, &self.message(other))
            .is_ok()
    }

    pub fn outpoint(&self) -> OutPoint {
        self.vin.prevout
    }

    /// Payout script derived from the collateral key
    pub fn payee_script(&self) -> Script {
        Script::pay_to_key_hash(&self.collateral_pubkey)
    }
}

/// One registry participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Masternode {
    pub vin: TxIn,
    pub addr: SocketAddr,
    pub collateral_pubkey: Vec<u8>,
    pub operator_pubkey: Vec<u8>,
    pub protocol_version: u32,
    pub sig_time: i64,
    pub signature: Vec<u8>,
    pub format: MessageFormat,
    pub last_ping: Option<Ping>,
    pub state: MasternodeState,
}

impl Masternode {
    pub fn from_announce(announce: &Announce) -> Self {
        Masternode {
            vin: announce.vin.clone(),
            addr: announce.addr,
            collateral_pubkey: announce.collateral_pubkey.clone(),
            operator_pubkey: announce.operator_pubkey.clone(),
            protocol_version: announce.protocol_version,
            sig_time: announce.sig_time,
            signature: announce.signature.clone(),
            format: announce.format,
            last_ping: Some(announce.last_ping.clone()),
            state: MasternodeState::Enabled,
        }
    }

    pub fn outpoint(&self) -> OutPoint {
        self.vin.prevout
    }

    pub fn payee_script(&self) -> Script {
        Script::pay_to_key_hash(&self.collateral_pubkey)
    }

    pub fn is_enabled(&self) -> bool {
        self.state == MasternodeState::Enabled
    }

    /// Whether the last ping arrived within `window` seconds of `at`
    pub fn is_pinged_within(&self, window: i64, at: i64) -> bool {
        match &self.last_ping {
            Some(ping) => at - ping.sig_time < window,
            None => false,
        }
    }

    /// Refresh the state from the last ping age. Removed and VinSpent are
    /// terminal for the lifetime of the process.
    pub fn check(&mut self, now: i64) {
        if matches!(self.state, MasternodeState::VinSpent | MasternodeState::Removed) {
            return;
        }

        if !self.is_pinged_within(MASTERNODE_REMOVAL_SECONDS, now) {
            self.state = MasternodeState::Removed;
            return;
        }

        if !self.is_pinged_within(MASTERNODE_EXPIRATION_SECONDS, now) {
            self.state = MasternodeState::Expired;
            return;
        }

        let ping_age = match &self.last_ping {
            Some(ping) => ping.sig_time - self.sig_time,
            None => 0,
        };
        if ping_age < MASTERNODE_MIN_MNP_SECONDS {
            self.state = MasternodeState::PreEnabled;
            return;
        }

        self.state = MasternodeState::Enabled;
    }

    /// Apply a strictly newer broadcast to this record
    pub fn update_from_announce(&mut self, announce: &Announce) -> bool {
        if announce.sig_time <= self.sig_time {
            return false;
        }
        self.operator_pubkey = announce.operator_pubkey.clone();
        self.collateral_pubkey = announce.collateral_pubkey.clone();
        self.sig_time = announce.sig_time;
        self.signature = announce.signature.clone();
        self.format = announce.format;
        self.protocol_version = announce.protocol_version;
        self.addr = announce.addr;
        self.last_ping = Some(announce.last_ping.clone());
        true
    }

    /// Deterministic seconds-since-payment stand-in for masternodes with no
    /// indexable payment, strictly greater than one month
    pub fn stale_payment_stand_in(&self) -> i64 {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(self.vin.prevout.txid.as_bytes());
        bytes.extend_from_slice(&self.vin.prevout.vout.to_le_bytes());
        bytes.extend_from_slice(&self.sig_time.to_le_bytes());
        let hash = Hash256::double_sha256(&bytes);
        MONTH_IN_SECONDS + hash.compact() as i64
    }
}
