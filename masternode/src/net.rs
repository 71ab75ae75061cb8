//! Peer surface and masternode wire messages

use crate::masternode::{Announce, Ping};
use ember_core::{Hash256, OutPoint};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// List-sync item identifier carried by `SyncStatusCount`
pub const MASTERNODE_SYNC_LIST: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvType {
    MasternodeAnnounce,
    MasternodePing,
}

/// Inventory notice offered to a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub kind: InvType,
    pub hash: Hash256,
}

/// Masternode messages exchanged with peers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetMessage {
    /// MNBROADCAST
    Broadcast(Box<Announce>),
    /// MNPING
    Ping(Ping),
    /// GETMNLIST; `None` asks for the full list
    GetList(Option<OutPoint>),
    /// SYNCSTATUSCOUNT reply to a full-list request
    SyncStatusCount { item: u32, count: u32 },
}

/// Handle to a connected peer, provided by the embedding node
pub trait Peer {
    fn id(&self) -> u64;
    fn addr(&self) -> SocketAddr;
    fn push_message(&self, message: NetMessage);
    fn push_inventory(&self, inventory: Inventory);
    /// Raise this peer's misbehavior score
    fn misbehaving(&self, score: u32);
}
