//! Local masternode status management
//!
//! When this node operates a masternode of its own, the maintenance loop
//! periodically signs and injects a fresh ping for it.

use crate::error::{MasternodeError, Result};
use crate::manager::{MasternodeManager, Verdict};
use crate::masternode::Ping;
use crate::{MASTERNODE_PING_BLOCK_DEPTH, MASTERNODE_PING_SECONDS};
use ember_core::{ChainState, NetworkParams, OutPoint};
use ember_crypto::{KeyPair, MessageFormat};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveStatus {
    Initial,
    NotCapable,
    Started,
}

impl fmt::Display for ActiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::NotCapable => write!(f, "not capable"),
            Self::Started => write!(f, "started"),
        }
    }
}

/// The masternode run by this node, if any
pub struct ActiveMasternode {
    pub outpoint: Option<OutPoint>,
    pub operator_key: Option<KeyPair>,
    pub status: ActiveStatus,
    last_ping_time: i64,
}

impl ActiveMasternode {
    pub fn new() -> Self {
        ActiveMasternode {
            outpoint: None,
            operator_key: None,
            status: ActiveStatus::Initial,
            last_ping_time: 0,
        }
    }

    pub fn configure(&mut self, outpoint: OutPoint, operator_key: KeyPair) {
        self.outpoint = Some(outpoint);
        self.operator_key = Some(operator_key);
    }

    /// Periodic self-check: sign and process a fresh ping for our own
    /// registry entry
    pub fn manage_status(
        &mut self,
        manager: &MasternodeManager,
        host: &ChainState,
        params: &NetworkParams,
        now: i64,
    ) -> Result<()> {
        let (outpoint, key) = match (self.outpoint, &self.operator_key) {
            (Some(outpoint), Some(key)) => (outpoint, key),
            _ => return Ok(()),
        };

        if manager.find(&outpoint).is_none() {
            self.status = ActiveStatus::NotCapable;
            return Err(MasternodeError::NotFound(outpoint.to_string()));
        }

        if now - self.last_ping_time < MASTERNODE_PING_SECONDS {
            return Ok(());
        }

        // reference a block comfortably inside the ping depth window
        let tip_height = host.height();
        let ping_height = (tip_height - MASTERNODE_PING_BLOCK_DEPTH / 2).max(0);
        let block_hash = host
            .chain
            .at(ping_height)
            .map(|index| index.hash)
            .ok_or_else(|| MasternodeError::MissingChainData("ping block".into()))?;

        let format = if params.stake_modifier_v2_active(tip_height) {
            MessageFormat::SignatureHash
        } else {
            MessageFormat::Legacy
        };

        let mut ping = Ping::new(outpoint, block_hash, now);
        ping.sign(key, format, manager.ping_salt());

        match manager.process_ping(&ping, host, now) {
            Verdict::Accepted => {
                self.last_ping_time = now;
                self.status = ActiveStatus::Started;
                log::info!("local masternode ping relayed for {}", outpoint);
            }
            verdict => {
                log::debug!("local masternode ping not accepted: {:?}", verdict);
            }
        }

        Ok(())
    }
}

impl Default for ActiveMasternode {
    fn default() -> Self {
        Self::new()
    }
}
