//! Aggregate chain state: active chain, UTXO view, block and tx storage
//!
//! This is the host-node surface the consensus core reads. Connecting a
//! block updates every index; disconnecting restores spent coins from the
//! per-height undo data.

use crate::block::Block;
use crate::chain::{BlockIndex, BlockStore, Chain, TxIndex};
use crate::coins::{Coin, CoinsView};
use crate::constants::{Amount, Height};
use crate::hash::Hash256;
use crate::transaction::OutPoint;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ChainState {
    pub chain: Chain,
    pub coins: CoinsView,
    pub blocks: BlockStore,
    pub tx_index: TxIndex,
    /// Coins spent per height, for disconnects
    undo: HashMap<Height, Vec<(OutPoint, Coin)>>,
}

impl ChainState {
    pub fn new() -> Self {
        ChainState::default()
    }

    pub fn tip(&self) -> Option<Arc<BlockIndex>> {
        self.chain.tip()
    }

    pub fn height(&self) -> Height {
        self.chain.height()
    }

    /// Append a block to the active chain, updating the UTXO view and the
    /// transaction index. `chain_work` and `money_supply` are cumulative.
    pub fn connect_block(
        &mut self,
        block: &Block,
        chain_work: u128,
        money_supply: Amount,
    ) -> Arc<BlockIndex> {
        let height = self.height() + 1;
        let hash = block.hash();

        let mut spent = Vec::new();
        for tx in &block.transactions {
            for input in &tx.inputs {
                if let Some(coin) = self.coins.spend_coin(&input.prevout) {
                    spent.push((input.prevout, coin));
                }
            }

            let txid = tx.txid();
            for (vout, out) in tx.outputs.iter().enumerate() {
                if out.is_empty_marker() {
                    continue;
                }
                self.coins.add_coin(
                    OutPoint::new(txid, vout as u32),
                    Coin::new(out.clone(), height, tx.is_coinbase(), tx.is_coinstake()),
                );
            }

            self.tx_index.insert(tx, hash);
        }
        self.undo.insert(height, spent);

        self.blocks.insert(block);

        let mut index = BlockIndex::new(height, hash, block.header.prev_hash, block.header.time);
        index.chain_work = chain_work;
        index.money_supply = money_supply;
        self.chain.connect_tip(index)
    }

    /// Remove the tip block, restoring the coins it spent
    pub fn disconnect_tip(&mut self) -> Option<(Arc<BlockIndex>, Block)> {
        let index = self.chain.disconnect_tip()?;
        let block = self.blocks.read(&index)?;

        for tx in &block.transactions {
            let txid = tx.txid();
            for vout in 0..tx.outputs.len() {
                self.coins.spend_coin(&OutPoint::new(txid, vout as u32));
            }
        }

        if let Some(spent) = self.undo.remove(&index.height) {
            for (outpoint, coin) in spent {
                self.coins.add_coin(outpoint, coin);
            }
        }

        Some((index, block))
    }

    pub fn best_hash(&self) -> Hash256 {
        self.tip().map(|tip| tip.hash).unwrap_or(Hash256::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use crate::transaction::{Transaction, TxIn, TxOut};

    fn spendable_block(prev: Hash256, time: i64, value: i64) -> Block {
        let coinbase = Transaction::new(
            vec![],
            vec![TxOut::new(value, Script::new(vec![time as u8]))],
        );
        Block::new(prev, time, vec![coinbase])
    }

    #[test]
    fn test_connect_disconnect_restores_coins() {
        let mut state = ChainState::new();

        let genesis = spendable_block(Hash256::ZERO, 1, 100);
        let coinbase_txid = genesis.transactions[0].txid();
        state.connect_block(&genesis, 1, 100);

        // block 1 spends the genesis coinbase
        let spend = Transaction::new(
            vec![TxIn::new(OutPoint::new(coinbase_txid, 0))],
            vec![TxOut::new(100, Script::new(vec![9]))],
        );
        let coinbase = Transaction::new(vec![], vec![TxOut::new(50, Script::new(vec![2]))]);
        let block1 = Block::new(state.best_hash(), 2, vec![coinbase, spend]);
        state.connect_block(&block1, 2, 150);

        let op = OutPoint::new(coinbase_txid, 0);
        assert!(state.coins.coin(&op).is_none());

        state.disconnect_tip().unwrap();
        assert_eq!(state.height(), 0);
        let restored = state.coins.coin(&op).unwrap();
        assert_eq!(restored.value(), 100);
        assert_eq!(restored.height, 0);
    }
}
