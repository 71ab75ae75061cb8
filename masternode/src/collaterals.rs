//! Collateral UTXO index and payment history
//!
//! Three maps over the UTXO set restricted to the admissible masternode
//! collateral denominations (this week's and next week's), an undo log
//! keyed by height, and the per-payee payment history. All of it lives
//! behind one lock in the manager and is rebuilt from scratch whenever the
//! index is missing, stale, or undone below its initialisation height.

use crate::MAX_REORG_DEPTH;
use ember_core::{
    Amount, Block, BlockIndex, ChainState, Coin, Height, NetworkParams, OutPoint, Script,
    HOUR_IN_SECONDS,
};
use ember_rewards::schedule;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct CollateralTracker {
    by_script: HashMap<Script, Coin>,
    by_outpoint: HashMap<OutPoint, Coin>,
    by_amount: HashMap<Amount, HashSet<OutPoint>>,
    /// Outpoints removed at each height, for disconnects
    removed: HashMap<Height, HashMap<OutPoint, Coin>>,
    /// Blocks at which each payout script received the masternode payment
    payee_blocks: HashMap<Script, Vec<Arc<BlockIndex>>>,
    /// Inverse of `payee_blocks`: the script paid at each height
    height_payee: HashMap<Height, Script>,
    /// Height the index was initialised at, -1 when a rebuild is needed
    initiated_at: Height,
    /// Wall-clock time of the last connect/disconnect, for the sleep-wake
    /// heuristic
    last_process: i64,
}

impl CollateralTracker {
    pub fn new() -> Self {
        CollateralTracker {
            initiated_at: -1,
            ..Default::default()
        }
    }

    /// Force a rebuild on the next connect
    pub fn reset(&mut self) {
        self.initiated_at = -1;
    }

    /// Full rebuild: scan the UTXO set for admissible coins, then replay
    /// the payment history for the most recent `2 x |collaterals|` blocks.
    /// Returns false when interrupted.
    pub fn init(
        &mut self,
        host: &ChainState,
        params: &NetworkParams,
        payment_at: &dyn Fn(Height) -> Amount,
        now: i64,
        interrupt: &AtomicBool,
    ) -> bool {
        self.by_script.clear();
        self.by_outpoint.clear();
        self.by_amount.clear();
        self.removed.clear();
        self.payee_blocks.clear();
        self.height_payee.clear();

        let height = host.height();
        let collateral = schedule::collateral(height);
        let next_week = schedule::collateral(height + params.blocks_per_week());

        if collateral > 0 || next_week > 0 {
            for (outpoint, coin) in host.coins.cursor() {
                if interrupt.load(Ordering::Relaxed) {
                    return false;
                }
                if coin.value() == collateral || coin.value() == next_week {
                    self.insert_coin(*outpoint, coin.clone());
                }
            }
        }

        let max_depth = 2 * self.by_script.len() as Height;
        for h in (height - max_depth).max(0)..=height {
            if let Some(index) = host.chain.at(h) {
                let payee = host
                    .blocks
                    .read(&index)
                    .and_then(|block| block.paid_payee(payment_at(h)));
                if let Some(payee) = payee {
                    self.record_payment(payee, index);
                }
            }
        }

        self.initiated_at = height;
        self.last_process = now;

        log::info!(
            "Collateral index initialised at height {}: {} collaterals, {} payees",
            height,
            self.by_outpoint.len(),
            self.payee_blocks.len()
        );

        true
    }

    /// Apply a connected block. Returns the payout scripts whose collateral
    /// left the index (their masternodes are to be marked VinSpent), or
    /// `None` when the index needed a rebuild and it was interrupted.
    #[allow(clippy::too_many_arguments)]
    pub fn connect_block(
        &mut self,
        host: &ChainState,
        params: &NetworkParams,
        payment_at: &dyn Fn(Height) -> Amount,
        block: &Block,
        pindex: &Arc<BlockIndex>,
        now: i64,
        interrupt: &AtomicBool,
    ) -> Option<Vec<Script>> {
        // a long gap since the last call means the host slept; distrust
        // the incremental state
        if now > self.last_process + HOUR_IN_SECONDS {
            self.initiated_at = -1;
        }
        self.last_process = now;

        if self.initiated_at < 0 && !self.init(host, params, payment_at, now, interrupt) {
            return None;
        }

        let height = pindex.height;
        let mut spent_scripts = Vec::new();

        // drop undo data beyond the reorg horizon
        let removal_height = height - MAX_REORG_DEPTH;
        self.removed.remove(&removal_height);
        self.initiated_at = self.initiated_at.max(removal_height);

        let collateral = schedule::collateral(height);
        let next_week = schedule::collateral(height + params.blocks_per_week());

        // purge denominations that stopped being admissible
        let stale_amounts: Vec<Amount> = self
            .by_amount
            .keys()
            .copied()
            .filter(|&amount| amount != collateral && amount != next_week)
            .collect();
        for amount in stale_amounts {
            if let Some(outpoints) = self.by_amount.remove(&amount) {
                for outpoint in outpoints {
                    if let Some(coin) = self.by_outpoint.remove(&outpoint) {
                        let script = coin.script_pubkey().clone();
                        self.by_script.remove(&script);
                        self.removed
                            .entry(height)
                            .or_default()
                            .insert(outpoint, coin);
                        spent_scripts.push(script);
                    }
                }
            }
        }

        for tx in &block.transactions {
            // collaterals spent by this block
            for input in &tx.inputs {
                if let Some(coin) = self.by_outpoint.remove(&input.prevout) {
                    let script = coin.script_pubkey().clone();
                    self.by_script.remove(&script);
                    if let Some(group) = self.by_amount.get_mut(&coin.value()) {
                        group.remove(&input.prevout);
                    }
                    self.removed
                        .entry(height)
                        .or_default()
                        .insert(input.prevout, coin);
                    spent_scripts.push(script);
                }
            }

            // collaterals created by this block
            let txid = tx.txid();
            for (vout, out) in tx.outputs.iter().enumerate() {
                if out.value == collateral || out.value == next_week {
                    let outpoint = OutPoint::new(txid, vout as u32);
                    let coin = Coin::new(out.clone(), height, tx.is_coinbase(), tx.is_coinstake());
                    self.insert_coin(outpoint, coin);
                }
            }
        }

        // register the paid payee for this block; a rebuild that already
        // replayed this height must not record it twice
        if !self.height_payee.contains_key(&height) {
            if let Some(payee) = block.paid_payee(payment_at(height)) {
                if !payee.is_empty() {
                    self.record_payment(payee, pindex.clone());
                }
            }
        }

        Some(spent_scripts)
    }

    /// Undo a disconnected block: created collaterals leave the index, the
    /// undo bucket for this height is replayed, and the payment entry is
    /// popped. Returns the payout scripts whose collateral came back.
    pub fn disconnect_block(
        &mut self,
        params: &NetworkParams,
        block: &Block,
        pindex: &BlockIndex,
        now: i64,
    ) -> Vec<Script> {
        if now > self.last_process + HOUR_IN_SECONDS {
            self.initiated_at = -1;
        }
        self.last_process = now;

        let height = pindex.height;

        // undoing below the initialisation height invalidates everything
        // the init scan saw; rebuild on the next connect
        if height < self.initiated_at {
            self.initiated_at = -1;
            return Vec::new();
        }

        let collateral = schedule::collateral(height);
        let next_week = schedule::collateral(height + params.blocks_per_week());

        for tx in &block.transactions {
            let txid = tx.txid();
            for (vout, out) in tx.outputs.iter().enumerate() {
                if out.value == collateral || out.value == next_week {
                    let outpoint = OutPoint::new(txid, vout as u32);
                    self.by_script.remove(&out.script_pubkey);
                    self.by_outpoint.remove(&outpoint);
                    if let Some(group) = self.by_amount.get_mut(&out.value) {
                        group.remove(&outpoint);
                    }
                }
            }
        }

        let mut restored = Vec::new();
        if let Some(bucket) = self.removed.remove(&height) {
            for (outpoint, coin) in bucket {
                restored.push(coin.script_pubkey().clone());
                self.insert_coin(outpoint, coin);
            }
        }

        if let Some(payee) = self.height_payee.remove(&height) {
            if let Some(blocks) = self.payee_blocks.get_mut(&payee) {
                blocks.pop();
                if blocks.is_empty() {
                    self.payee_blocks.remove(&payee);
                }
            }
        }

        restored
    }

    fn insert_coin(&mut self, outpoint: OutPoint, coin: Coin) {
        self.by_script
            .insert(coin.script_pubkey().clone(), coin.clone());
        self.by_amount
            .entry(coin.value())
            .or_default()
            .insert(outpoint);
        self.by_outpoint.insert(outpoint, coin);
    }

    fn record_payment(&mut self, payee: Script, index: Arc<BlockIndex>) {
        self.height_payee.insert(index.height, payee.clone());
        self.payee_blocks.entry(payee).or_default().push(index);
    }

    pub fn has_collateral(&self, script: &Script) -> bool {
        self.by_script.contains_key(script)
    }

    pub fn collateral(&self, script: &Script) -> Option<Coin> {
        self.by_script.get(script).cloned()
    }

    /// Most recent payment to `script` at or below the given tip
    pub fn last_paid_block(
        &self,
        script: &Script,
        pindex: &BlockIndex,
    ) -> Option<Arc<BlockIndex>> {
        let blocks = self.payee_blocks.get(script)?;
        // blocks are appended in connect order, so they are height-sorted
        let pos = blocks.partition_point(|b| b.height <= pindex.height);
        if pos == 0 {
            None
        } else {
            Some(blocks[pos - 1].clone())
        }
    }

    /// Reorg-safe variant: when the caller's tip is off the main chain,
    /// walk disk blocks backwards until the main chain is rejoined or the
    /// reorg horizon is reached.
    pub fn last_paid_block_slow(
        &self,
        script: &Script,
        pindex: &Arc<BlockIndex>,
        host: &ChainState,
        payment_at: &dyn Fn(Height) -> Amount,
    ) -> Option<Arc<BlockIndex>> {
        let mut cursor = pindex.clone();

        for _ in 0..MAX_REORG_DEPTH {
            let on_chain = host
                .chain
                .at(cursor.height)
                .map(|entry| entry.hash == cursor.hash)
                .unwrap_or(false);
            if on_chain {
                return self.last_paid_block(script, &cursor);
            }

            let block = host.blocks.read(&cursor)?;

            if block.paid_payee(payment_at(cursor.height)).as_ref() == Some(script) {
                return Some(cursor);
            }

            if block.header.prev_hash.is_zero() {
                return None;
            }
            cursor = host.chain.block_index(&block.header.prev_hash)?;
        }

        // reorg horizon reached; continue with the indexed lookup
        self.last_paid_block(script, &cursor)
    }

    /// Blocks since `script` was last paid, as seen from `pindex`.
    /// Falls back to the collateral age when never paid, and -1 when the
    /// script is not a known collateral at all.
    pub fn blocks_since_payment(
        &self,
        script: &Script,
        pindex: &Arc<BlockIndex>,
        host: &ChainState,
        payment_at: &dyn Fn(Height) -> Amount,
    ) -> Height {
        if let Some(paid) = self.last_paid_block_slow(script, pindex, host, payment_at) {
            return pindex.height - paid.height;
        }

        if let Some(coin) = self.by_script.get(script) {
            if coin.height != 0 {
                return pindex.height - coin.height;
            }
        }

        -1
    }

    /// Block time of the last payment to `script`, 0 when never paid
    pub fn last_paid_time(&self, script: &Script, pindex: &BlockIndex) -> i64 {
        self.last_paid_block(script, pindex)
            .map(|index| index.time)
            .unwrap_or(0)
    }

    pub fn collateral_count(&self) -> usize {
        self.by_outpoint.len()
    }

    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert!(self.by_script.len() <= self.by_outpoint.len());
        let grouped: usize = self.by_amount.values().map(|set| set.len()).sum();
        assert_eq!(grouped, self.by_outpoint.len());
        for (height, payee) in &self.height_payee {
            let blocks = self.payee_blocks.get(payee).expect("payee entry");
            assert_eq!(
                blocks.iter().filter(|b| b.height == *height).count(),
                1,
                "height {} must appear exactly once for its payee",
                height
            );
        }
    }
}
