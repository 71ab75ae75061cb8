//! Active chain, block index and block storage contracts

use crate::block::Block;
use crate::constants::{Amount, Height};
use crate::hash::Hash256;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Per-block metadata kept for every known block
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct BlockIndex {
    pub height: Height,
    pub hash: Hash256,
    pub prev_hash: Hash256,
    pub time: i64,
    /// Cumulative chain work up to and including this block
    pub chain_work: u128,
    /// Total money supply after this block
    pub money_supply: Amount,
}

impl BlockIndex {
    pub fn new(height: Height, hash: Hash256, prev_hash: Hash256, time: i64) -> Self {
        BlockIndex {
            height,
            hash,
            prev_hash,
            time,
            chain_work: 0,
            money_supply: 0,
        }
    }
}

/// The active chain plus an index of every block ever seen,
/// including blocks on abandoned branches.
#[derive(Default)]
pub struct Chain {
    active: Vec<Arc<BlockIndex>>,
    by_hash: HashMap<Hash256, Arc<BlockIndex>>,
}

impl Chain {
    pub fn new() -> Self {
        Chain::default()
    }

    pub fn tip(&self) -> Option<Arc<BlockIndex>> {
        self.active.last().cloned()
    }

    /// Height of the active tip, -1 when empty
    pub fn height(&self) -> Height {
        self.active.len() as Height - 1
    }

    /// Block index at the given active-chain height
    pub fn at(&self, height: Height) -> Option<Arc<BlockIndex>> {
        if height < 0 {
            return None;
        }
        self.active.get(height as usize).cloned()
    }

    /// Whether the given index is part of the active chain
    pub fn contains(&self, index: &BlockIndex) -> bool {
        self.at(index.height)
            .map(|entry| entry.hash == index.hash)
            .unwrap_or(false)
    }

    /// Look up any known block index by hash, on-chain or not
    pub fn block_index(&self, hash: &Hash256) -> Option<Arc<BlockIndex>> {
        self.by_hash.get(hash).cloned()
    }

    /// Append a block index to the active chain
    pub fn connect_tip(&mut self, index: BlockIndex) -> Arc<BlockIndex> {
        let entry = Arc::new(index);
        self.by_hash.insert(entry.hash, entry.clone());
        self.active.push(entry.clone());
        entry
    }

    /// Remove the tip from the active chain. The index stays known by hash
    /// so reorged-away blocks remain resolvable.
    pub fn disconnect_tip(&mut self) -> Option<Arc<BlockIndex>> {
        self.active.pop()
    }

    /// Register an off-chain block index (a branch block)
    pub fn insert_index(&mut self, index: BlockIndex) -> Arc<BlockIndex> {
        let entry = Arc::new(index);
        self.by_hash.insert(entry.hash, entry.clone());
        entry
    }
}

/// Block body storage, addressed by block hash
#[derive(Default)]
pub struct BlockStore {
    blocks: HashMap<Hash256, Block>,
}

impl BlockStore {
    pub fn new() -> Self {
        BlockStore::default()
    }

    pub fn insert(&mut self, block: &Block) {
        self.blocks.insert(block.hash(), block.clone());
    }

    pub fn read(&self, index: &BlockIndex) -> Option<Block> {
        self.blocks.get(&index.hash).cloned()
    }

    pub fn read_by_hash(&self, hash: &Hash256) -> Option<Block> {
        self.blocks.get(hash).cloned()
    }
}

/// Transaction lookup by txid, with the hash of the containing block
#[derive(Default)]
pub struct TxIndex {
    txs: HashMap<Hash256, (Transaction, Hash256)>,
}

impl TxIndex {
    pub fn new() -> Self {
        TxIndex::default()
    }

    pub fn insert(&mut self, tx: &Transaction, block_hash: Hash256) {
        self.txs.insert(tx.txid(), (tx.clone(), block_hash));
    }

    pub fn get_transaction(&self, txid: &Hash256) -> Option<&(Transaction, Hash256)> {
        self.txs.get(txid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(height: Height, seed: u8) -> BlockIndex {
        BlockIndex::new(
            height,
            Hash256::double_sha256(&[seed]),
            Hash256::ZERO,
            1000 + height,
        )
    }

    #[test]
    fn test_connect_and_disconnect_tip() {
        let mut chain = Chain::new();
        assert_eq!(chain.height(), -1);

        chain.connect_tip(index(0, 1));
        let tip = chain.connect_tip(index(1, 2));
        assert_eq!(chain.height(), 1);
        assert!(chain.contains(&tip));

        chain.disconnect_tip();
        assert_eq!(chain.height(), 0);
        assert!(!chain.contains(&tip));
        // reorged-away block is still resolvable by hash
        assert!(chain.block_index(&tip.hash).is_some());
    }

    #[test]
    fn test_off_chain_index_is_not_contained() {
        let mut chain = Chain::new();
        chain.connect_tip(index(0, 1));
        let branch = chain.insert_index(index(0, 9));
        assert!(!chain.contains(&branch));
        assert!(chain.block_index(&branch.hash).is_some());
    }
}
