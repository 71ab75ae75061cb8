//! Dynamic block reward engine
//!
//! Once per adjustment interval (an "epoch") the per-block subsidy is
//! recomputed from the observed circulating supply and realized emission,
//! then persisted so restarts resume with the same values. Between epoch
//! boundaries the stored value caps the scheduled subsidy.

use crate::error::{Result, RewardsError};
use crate::schedule;
use ember_core::{
    Amount, BlockIndex, BlockStore, Chain, CoinsView, Height, NetworkParams, TxIndex, COIN,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Attempts made to open the rewards database before giving up.
/// A restarting node can briefly overlap the closing instance.
const DB_OPEN_ATTEMPTS: u32 = 5;
const DB_OPEN_WAIT: Duration = Duration::from_millis(100);

/// Yearly target emission as a fraction of total money supply, in
/// parts-per-million
const TOTAL_SUPPLY_TARGET_EMISSION: Amount = 20_000;

/// Yearly target emission as a fraction of adjusted circulating supply,
/// in parts-per-million
const CIRCULATING_TARGET_EMISSION: Amount = 50_000;

pub struct RewardEngine {
    params: NetworkParams,
    path: PathBuf,
    db: Option<sled::Db>,
    rewards: HashMap<Height, Amount>,
    initiated: bool,
    /// Set when the database could not be opened; the engine then serves
    /// the static schedule for the rest of the session
    disabled: bool,
}

impl RewardEngine {
    pub fn new<P: AsRef<Path>>(datadir: P, params: NetworkParams) -> Self {
        RewardEngine {
            params,
            path: datadir.as_ref().join("chainstate").join("rewards.db"),
            db: None,
            rewards: HashMap::new(),
            initiated: false,
            disabled: false,
        }
    }

    /// Open the database, load persisted epochs, and fill any gaps from the
    /// block files. `reindex` wipes the database first.
    pub fn init(
        &mut self,
        chain: &Chain,
        store: &BlockStore,
        tx_index: &TxIndex,
        reindex: bool,
    ) -> Result<()> {
        if self.initiated {
            return Ok(());
        }

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        if reindex && self.path.exists() {
            log::info!("Reindex requested, deleting rewards database");
            std::fs::remove_dir_all(&self.path)?;
        }

        let db = self.open_with_retries()?;

        for entry in db.iter() {
            let (key, value) = entry?;
            let height = decode_height(&key)?;
            let amount: Amount = bincode::deserialize(&value)
                .map_err(|e| RewardsError::Serialization(e.to_string()))?;
            self.rewards.insert(height, amount);
        }

        self.db = Some(db);
        self.fill_missing_epochs(chain, store, tx_index)?;

        if !self.rewards.is_empty() {
            let mut heights: Vec<_> = self.rewards.keys().copied().collect();
            heights.sort_unstable();
            for height in heights {
                log::info!(
                    "Dynamic reward at height {}: {}",
                    height,
                    self.rewards[&height]
                );
            }
        }

        self.initiated = true;
        Ok(())
    }

    fn open_with_retries(&self) -> Result<sled::Db> {
        let mut attempt = 1;
        loop {
            log::info!("Opening rewards database: {}", self.path.display());
            match sled::open(&self.path) {
                Ok(db) => return Ok(db),
                Err(e) if attempt < DB_OPEN_ATTEMPTS => {
                    log::warn!("Rewards database busy ({}), retrying", e);
                    std::thread::sleep(DB_OPEN_WAIT);
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("Can't open rewards database: {}", e);
                    return Err(RewardsError::OpenExhausted(DB_OPEN_ATTEMPTS));
                }
            }
        }
    }

    /// Recover epochs absent from the database from the realized subsidy of
    /// each epoch's first block.
    fn fill_missing_epochs(
        &mut self,
        chain: &Chain,
        store: &BlockStore,
        tx_index: &TxIndex,
    ) -> Result<()> {
        let activation = match self.params.dynamic_rewards_height {
            Some(height) => height,
            None => return Ok(()),
        };
        let interval = self.params.reward_adjustment_interval;
        let tip_height = chain.height();

        let mut epoch_height = self.epoch_height(activation) + interval;
        while epoch_height <= tip_height {
            if !self.rewards.contains_key(&epoch_height) {
                // the first block of the epoch carries the adjusted reward
                if let Some(block) = chain.at(epoch_height + 1).and_then(|ix| store.read(&ix)) {
                    if let Some(tx) = block.reward_transaction() {
                        let mut subsidy: Amount = 0;
                        for input in &tx.inputs {
                            if let Some((prev_tx, _)) = tx_index.get_transaction(&input.prevout.txid)
                            {
                                if let Some(out) =
                                    prev_tx.outputs.get(input.prevout.vout as usize)
                                {
                                    subsidy -= out.value;
                                }
                            }
                        }
                        subsidy += tx.value_out();

                        self.persist(epoch_height, subsidy)?;
                        self.rewards.insert(epoch_height, subsidy);
                    }
                }
            }
            epoch_height += interval;
        }
        Ok(())
    }

    pub fn epoch(&self, height: Height) -> Height {
        height / self.params.reward_adjustment_interval
    }

    /// The epoch boundary at or below the given height
    pub fn epoch_height(&self, height: Height) -> Height {
        self.epoch(height) * self.params.reward_adjustment_interval
    }

    pub fn is_epoch_height(&self, height: Height) -> bool {
        self.epoch_height(height) == height
    }

    /// Subsidy for the given height: the schedule, capped by the dynamic
    /// value of the surrounding epoch once the upgrade is active.
    pub fn block_value(&self, height: Height) -> Amount {
        let subsidy = schedule::base_subsidy(height);

        if self.params.dynamic_rewards_active(height) {
            // the adjustment computed at a boundary applies to the blocks
            // after it, so the boundary itself pays like its predecessor
            if height > 0 && self.is_epoch_height(height) {
                return self.block_value(height - 1);
            }

            let epoch_height = self.epoch_height(height);
            if let Some(&dynamic) = self.rewards.get(&epoch_height) {
                return subsidy.min(dynamic);
            }
        }

        subsidy
    }

    /// Masternode share of the block value
    pub fn masternode_payment(&self, height: Height) -> Amount {
        if height < schedule::MASTERNODE_PAYMENT_START {
            return 0;
        }
        self.block_value(height) * schedule::MASTERNODE_SHARE_PCT / 100
    }

    /// Drive the engine across a block connect. Recomputes the subsidy at
    /// epoch boundaries; persistence failures fall back to the schedule and
    /// leave the in-memory map unchanged.
    pub fn connect_block(
        &mut self,
        tip: &BlockIndex,
        chain: &Chain,
        store: &BlockStore,
        tx_index: &TxIndex,
        coins: &CoinsView,
    ) -> bool {
        let height = tip.height;
        if !self.params.dynamic_rewards_active(height) {
            return true;
        }

        if self.disabled {
            return true;
        }

        if !self.initiated {
            if let Err(e) = self.init(chain, store, tx_index, false) {
                log::error!("Rewards engine disabled for this session: {}", e);
                self.disabled = true;
                return true;
            }
        }

        let subsidy = self.block_value(height);
        let epoch_height = self.epoch_height(height);
        let mut new_subsidy: Amount = 0;

        if self.is_epoch_height(height) {
            match self.compute_epoch_subsidy(tip, chain, coins, subsidy) {
                Ok(value) => new_subsidy = value,
                Err(e) => {
                    log::warn!("Epoch subsidy computation failed, keeping schedule: {}", e);
                    return true;
                }
            }
        }

        // if there is no entry for a running epoch, backfill it with the
        // value the blocks of the epoch are already paying
        if height != epoch_height && !self.rewards.contains_key(&epoch_height) {
            new_subsidy = subsidy;
        }

        if new_subsidy > 0 {
            if let Err(e) = self.persist(epoch_height, new_subsidy) {
                log::warn!("Failed to persist dynamic reward: {}", e);
                return true;
            }
            self.rewards.insert(epoch_height, new_subsidy);
            log::info!(
                "Adjustment at height {}: {} => {}",
                height,
                subsidy,
                new_subsidy
            );
        }

        true
    }

    /// Remove the epoch entry recorded at this height, if any
    pub fn disconnect_block(&mut self, height: Height) -> bool {
        if !self.params.dynamic_rewards_active(height) || !self.is_epoch_height(height) {
            return true;
        }

        if self.rewards.remove(&height).is_some() {
            if let Err(e) = self.erase_from(height) {
                log::warn!("Failed to erase dynamic reward at {}: {}", height, e);
                return false;
            }
        }
        true
    }

    /// Flush and release the database
    pub fn shutdown(&mut self) {
        if let Some(db) = self.db.take() {
            if let Err(e) = db.flush() {
                log::warn!("Failed to flush rewards database: {}", e);
            }
        }
        self.initiated = false;
    }

    fn compute_epoch_subsidy(
        &self,
        tip: &BlockIndex,
        chain: &Chain,
        coins: &CoinsView,
        subsidy: Amount,
    ) -> Result<Amount> {
        let height = tip.height;
        let interval = self.params.reward_adjustment_interval;
        let blocks_per_day = self.params.blocks_per_day();
        let blocks_per_week = self.params.blocks_per_week();
        let blocks_per_month = self.params.blocks_per_month();

        let money_supply = tip.money_supply;
        log::debug!("money supply: {}", money_supply);

        let collateral = schedule::collateral(height);
        let next_week_collateral = schedule::collateral(height + blocks_per_week);

        // circulating supply: every live coin, excluding burns and
        // masternode collateral denominations, weighted by age
        let mut circulating: Amount = 0;
        for (_, coin) in coins.cursor() {
            if self.params.is_burn_script(coin.script_pubkey(), height) {
                continue;
            }

            if coin.value() == collateral || coin.value() == next_week_collateral {
                continue;
            }

            // linear ramp: full weight up to 3 months old,
            // zero from 12 months on
            let blocks_diff = height - coin.height;
            let multiplier: i64 = 100_000_000;
            let weight = (((100 * multiplier)
                - ((100 * multiplier) / (9 * blocks_per_month))
                    * (blocks_diff - 3 * blocks_per_month))
                / multiplier)
                .clamp(0, 100);

            circulating += coin.value() * weight / 100;
        }
        log::debug!("circulating supply: {}", circulating);

        // derive the staked supply from the realized hashrate over the epoch
        let end = chain
            .tip()
            .ok_or_else(|| RewardsError::MissingChainData("empty chain".into()))?;
        let start = chain
            .at(end.height - interval.min(end.height))
            .ok_or_else(|| RewardsError::MissingChainData("epoch start".into()))?;
        let time_diff = end.time - start.time;
        let work_diff = end.chain_work - start.chain_work;
        let hashrate = if time_diff > 0 {
            (work_diff / time_diff as u128) as Amount
        } else {
            0
        };
        let staked = hashrate * self.params.time_slot_length * 100;
        log::debug!("network hashrate: {}, staked coins: {}", hashrate, staked);

        circulating = (circulating - staked).max(0);

        // target emission: average of the total-supply and circulating
        // yearly targets, scaled to this epoch
        let actual_emission = subsidy * interval;
        let supply_target = ((money_supply / (365 * blocks_per_day)) / 1_000_000)
            * TOTAL_SUPPLY_TARGET_EMISSION
            * interval;
        let circulating_target = ((circulating / (365 * blocks_per_day)) / 1_000_000)
            * CIRCULATING_TARGET_EMISSION
            * interval;
        let target_emission = (supply_target + circulating_target) / 2;

        let delta = (actual_emission - target_emission) / interval;
        log::debug!(
            "actual emission: {}, target emission: {}, delta: {}",
            actual_emission,
            target_emission,
            delta
        );

        // dampening weight: 1% at no deviation up to 10% at full deviation
        let ratio = ((delta * 100) / subsidy).abs();
        let weight = (ratio.min(100) * 9) / 100 + 1;
        let damped_delta = delta * weight / 100;

        let new_subsidy = subsidy - damped_delta;
        // whole coins only
        Ok((new_subsidy / COIN) * COIN)
    }

    fn persist(&self, height: Height, amount: Amount) -> Result<()> {
        let db = self
            .db
            .as_ref()
            .ok_or_else(|| RewardsError::MissingChainData("rewards db not open".into()))?;
        let value =
            bincode::serialize(&amount).map_err(|e| RewardsError::Serialization(e.to_string()))?;
        db.insert(encode_height(height), value)?;
        db.flush()?;
        Ok(())
    }

    fn erase_from(&self, height: Height) -> Result<()> {
        let db = self
            .db
            .as_ref()
            .ok_or_else(|| RewardsError::MissingChainData("rewards db not open".into()))?;
        let doomed: Vec<_> = db
            .range(encode_height(height)..)
            .keys()
            .collect::<std::result::Result<_, _>>()?;
        for key in doomed {
            db.remove(key)?;
        }
        db.flush()?;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn set_dynamic(&mut self, height: Height, amount: Amount) {
        self.rewards.insert(height, amount);
        self.initiated = true;
    }

    #[cfg(test)]
    pub(crate) fn dynamic(&self, height: Height) -> Option<Amount> {
        self.rewards.get(&height).copied()
    }
}

fn encode_height(height: Height) -> [u8; 8] {
    (height as u64).to_be_bytes()
}

fn decode_height(key: &[u8]) -> Result<Height> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| RewardsError::Serialization("bad height key".into()))?;
    Ok(u64::from_be_bytes(bytes) as Height)
}
