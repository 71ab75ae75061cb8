//! Node-wide masternode context
//!
//! One explicit object owning the registry manager, the payment logic's
//! collaborators, the dynamic reward engine and the sync oracle. Created
//! once at node start, torn down deterministically at shutdown.

use crate::active::ActiveMasternode;
use crate::cache::{MasternodeCache, ReadResult};
use crate::manager::MasternodeManager;
use crate::net::{NetMessage, Peer};
use crate::payments;
use crate::sync::SyncState;
use ember_core::{
    Amount, Block, BlockIndex, ChainState, Height, NetworkParams, Script, Transaction,
};
use ember_rewards::RewardEngine;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct MasternodeContext {
    pub params: NetworkParams,
    pub manager: MasternodeManager,
    pub engine: Mutex<RewardEngine>,
    pub sync: SyncState,
    pub active: Mutex<ActiveMasternode>,
    cache: MasternodeCache,
}

impl MasternodeContext {
    pub fn new<P: AsRef<Path>>(datadir: P, params: NetworkParams) -> Self {
        MasternodeContext {
            manager: MasternodeManager::new(params.clone()),
            engine: Mutex::new(RewardEngine::new(&datadir, params.clone())),
            sync: SyncState::new(),
            active: Mutex::new(ActiveMasternode::new()),
            cache: MasternodeCache::new(&datadir, params.message_start),
            params,
        }
    }

    /// Load persisted state. A bad cache file leaves the registry empty; a
    /// failing rewards database disables dynamic rewards for the session.
    /// Neither stops the node.
    pub fn startup(&self, host: &ChainState, reindex: bool, now: i64) -> ReadResult {
        {
            let mut engine = self.engine.lock().expect("engine lock poisoned");
            if let Err(e) = engine.init(&host.chain, &host.blocks, &host.tx_index, reindex) {
                log::error!("dynamic rewards disabled: {}", e);
            }
        }
        self.cache.load(&self.manager, now)
    }

    /// Dump the registry and close the rewards database. Long scans in
    /// flight observe the interrupt and stop.
    pub fn shutdown(&self) {
        self.manager
            .interrupt
            .store(true, std::sync::atomic::Ordering::Relaxed);
        if let Err(e) = self.cache.dump(&self.manager) {
            log::warn!("failed to dump masternode cache: {}", e);
        }
        self.engine.lock().expect("engine lock poisoned").shutdown();
    }

    pub fn block_value(&self, height: Height) -> Amount {
        self.engine
            .lock()
            .expect("engine lock poisoned")
            .block_value(height)
    }

    pub fn masternode_payment(&self, height: Height) -> Amount {
        self.engine
            .lock()
            .expect("engine lock poisoned")
            .masternode_payment(height)
    }

    /// Drive the reward engine and the collateral/payment indices across a
    /// block connect
    pub fn connect_block(
        &self,
        host: &ChainState,
        block: &Block,
        pindex: &Arc<BlockIndex>,
        now: i64,
    ) -> bool {
        let mut engine = self.engine.lock().expect("engine lock poisoned");
        engine.connect_block(pindex, &host.chain, &host.blocks, &host.tx_index, &host.coins);

        let engine = &*engine;
        let payment_at = |h: Height| engine.masternode_payment(h);
        self.manager
            .connect_block(host, &payment_at, block, pindex, now)
    }

    /// Undo a block disconnect in the reward engine and the indices
    pub fn disconnect_block(
        &self,
        block: &Block,
        pindex: &BlockIndex,
        now: i64,
    ) -> bool {
        let mut engine = self.engine.lock().expect("engine lock poisoned");
        let ok = engine.disconnect_block(pindex.height);
        drop(engine);

        self.manager.disconnect_block(block, pindex, now) && ok
    }

    /// Chain-facing payout validation for a candidate block
    pub fn is_block_payee_valid(
        &self,
        block: &Block,
        pindex_prev: &Arc<BlockIndex>,
        host: &ChainState,
        now: i64,
    ) -> bool {
        let engine = self.engine.lock().expect("engine lock poisoned");
        payments::is_block_payee_valid(
            block,
            pindex_prev,
            &self.manager,
            host,
            &engine,
            &self.sync,
            now,
        )
    }

    /// Producer-facing coinbase/coinstake filling
    pub fn fill_block_payee(
        &self,
        tx: &mut Transaction,
        pindex_prev: &Arc<BlockIndex>,
        proof_of_stake: bool,
        host: &ChainState,
        now: i64,
    ) {
        let engine = self.engine.lock().expect("engine lock poisoned");
        payments::fill_block_payee(
            tx,
            pindex_prev,
            proof_of_stake,
            &self.manager,
            host,
            &engine,
            now,
        );
    }

    /// The payout script the next block should carry
    pub fn get_block_payee(
        &self,
        pindex_prev: &Arc<BlockIndex>,
        host: &ChainState,
        now: i64,
    ) -> Option<Script> {
        payments::get_block_payee(&self.manager, host, pindex_prev, now)
    }

    /// Network-facing message entry point
    pub fn process_message(
        &self,
        peer: &dyn Peer,
        message: NetMessage,
        host: &ChainState,
        now: i64,
    ) {
        self.manager
            .process_message(peer, message, host, &self.sync, now);
    }
}
