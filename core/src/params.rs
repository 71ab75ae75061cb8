//! Network parameters for main, test and regression-test networks

use crate::constants::{DAY_IN_SECONDS, MONTH_IN_SECONDS, WEEK_IN_SECONDS};
use crate::constants::Height;
use crate::script::Script;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Main,
    Testnet,
    Regtest,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Main => write!(f, "main"),
            Self::Testnet => write!(f, "test"),
            Self::Regtest => write!(f, "regtest"),
        }
    }
}

/// Peer misbehavior scores. Policy values, kept as configuration so tests
/// can pin behavior without patching code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DosScores {
    pub malformed_key: u32,
    pub bad_signature: u32,
    pub mismatched_input: u32,
    pub bad_ping_signature: u32,
}

impl Default for DosScores {
    fn default() -> Self {
        DosScores {
            malformed_key: 100,
            bad_signature: 100,
            mismatched_input: 33,
            bad_ping_signature: 33,
        }
    }
}

/// Consensus and network configuration
#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub network: Network,
    pub default_port: u16,
    /// Network-specific magic prefixing persisted state and wire frames
    pub message_start: [u8; 4],
    /// Target seconds between blocks
    pub target_spacing: i64,
    /// Proof-of-stake time slot length in seconds
    pub time_slot_length: i64,
    /// Dynamic reward adjustment interval in blocks (one epoch)
    pub reward_adjustment_interval: i64,
    /// Activation height of the dynamic rewards upgrade, if scheduled
    pub dynamic_rewards_height: Option<Height>,
    /// Activation height of the hash-based message signature format
    pub stake_modifier_v2_height: Height,
    /// Burn destinations excluded from circulating supply, with the height
    /// each one activates at
    pub burn_scripts: HashMap<Script, Height>,
    pub dos_scores: DosScores,
}

impl NetworkParams {
    pub fn main() -> Self {
        let mut burn_scripts = HashMap::new();
        burn_scripts.insert(Script::pay_to_key_hash(&[0u8; 33]), 0);

        NetworkParams {
            network: Network::Main,
            default_port: 32972,
            message_start: [0xe1, 0xf4, 0xc2, 0xef],
            target_spacing: 60,
            time_slot_length: 15,
            reward_adjustment_interval: 7 * DAY_IN_SECONDS / 60,
            dynamic_rewards_height: None,
            stake_modifier_v2_height: 1301,
            burn_scripts,
            dos_scores: DosScores::default(),
        }
    }

    pub fn testnet() -> Self {
        NetworkParams {
            network: Network::Testnet,
            default_port: 42972,
            message_start: [0x74, 0xe5, 0xb1, 0xd2],
            target_spacing: 60,
            time_slot_length: 15,
            reward_adjustment_interval: 60,
            dynamic_rewards_height: None,
            stake_modifier_v2_height: 0,
            burn_scripts: HashMap::new(),
            dos_scores: DosScores::default(),
        }
    }

    pub fn regtest() -> Self {
        NetworkParams {
            network: Network::Regtest,
            default_port: 52972,
            message_start: [0xa9, 0x3c, 0x5e, 0x11],
            target_spacing: 60,
            time_slot_length: 15,
            reward_adjustment_interval: 20,
            dynamic_rewards_height: None,
            stake_modifier_v2_height: 251,
            burn_scripts: HashMap::new(),
            dos_scores: DosScores::default(),
        }
    }

    pub fn is_regtest(&self) -> bool {
        self.network == Network::Regtest
    }

    pub fn blocks_per_day(&self) -> i64 {
        DAY_IN_SECONDS / self.target_spacing
    }

    pub fn blocks_per_week(&self) -> i64 {
        WEEK_IN_SECONDS / self.target_spacing
    }

    pub fn blocks_per_month(&self) -> i64 {
        MONTH_IN_SECONDS / self.target_spacing
    }

    pub fn dynamic_rewards_active(&self, height: Height) -> bool {
        matches!(self.dynamic_rewards_height, Some(activation) if height >= activation)
    }

    pub fn stake_modifier_v2_active(&self, height: Height) -> bool {
        height >= self.stake_modifier_v2_height
    }

    /// Whether coins on this script are burned from the given height on
    pub fn is_burn_script(&self, script: &Script, height: Height) -> bool {
        matches!(self.burn_scripts.get(script), Some(&activation) if activation < height)
    }
}
