//! Ember Masternode Module
//!
//! Maintains the live masternode registry, the collateral and payment
//! indices, deterministic payee selection, and block payout validation.

pub mod active;
pub mod cache;
pub mod collaterals;
pub mod context;
pub mod error;
pub mod maintenance;
pub mod manager;
pub mod masternode;
pub mod net;
pub mod payments;
pub mod sync;

pub use context::MasternodeContext;
pub use error::{MasternodeError, Result};
pub use manager::MasternodeManager;
pub use masternode::{Announce, Masternode, MasternodeState, Ping};

use ember_core::HOUR_IN_SECONDS;

/// Confirmations a collateral needs before its announce is accepted
pub const MASTERNODE_MIN_CONFIRMATIONS: i64 = 15;

/// Minimum ping age before a masternode leaves pre-enabled
pub const MASTERNODE_MIN_MNP_SECONDS: i64 = 10 * 60;

/// Minimum age between accepted re-announces of the same masternode
pub const MASTERNODE_MIN_MNB_SECONDS: i64 = 5 * 60;

/// How often the local masternode pings
pub const MASTERNODE_PING_SECONDS: i64 = 5 * 60;

/// Ping silence after which a masternode expires
pub const MASTERNODE_EXPIRATION_SECONDS: i64 = 120 * 60;

/// Ping silence after which a masternode is removed
pub const MASTERNODE_REMOVAL_SECONDS: i64 = 130 * 60;

/// Per-peer window between full masternode list requests
pub const MASTERNODES_DSEG_SECONDS: i64 = 3 * HOUR_IN_SECONDS;

/// Maximum sigTime clock skew into the future
pub const MASTERNODE_FUTURE_SIGTIME: i64 = HOUR_IN_SECONDS;

/// A ping must reference a main-chain block at most this far below the tip
pub const MASTERNODE_PING_BLOCK_DEPTH: i64 = 24;

/// Reorganizations deeper than this force a full index rebuild
pub const MAX_REORG_DEPTH: i64 = 100;

/// Current wire protocol version
pub const PROTOCOL_VERSION: u32 = 70923;

/// Announces at or below this protocol version still use the legacy
/// string-message signature and are never scored for bad signatures
pub const MIN_PEER_MNANNOUNCE: u32 = 70920;

/// Seconds since the unix epoch
pub fn current_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
