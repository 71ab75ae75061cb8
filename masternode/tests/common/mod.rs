//! Shared fixture: a regtest node with a populated chain and helpers to
//! fund, register and pay masternodes.
#![allow(dead_code)]

use ember_core::{
    Block, BlockIndex, ChainState, NetworkParams, OutPoint, Script, Transaction, TxIn, TxOut,
};
use ember_crypto::{KeyPair, MessageFormat};
use ember_masternode::masternode::{Announce, Masternode, MasternodeState, Ping};
use ember_masternode::net::{Inventory, NetMessage, Peer};
use ember_masternode::{MasternodeContext, PROTOCOL_VERSION};
use ember_rewards::schedule;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Wall-clock "now" every test runs at
pub const NOW: i64 = 1_700_000_000;

/// Block times count backwards from NOW so the planned final tip lands on
/// the present
pub const FINAL_HEIGHT: i64 = 2_200;

pub fn block_time(height: i64) -> i64 {
    NOW - (FINAL_HEIGHT - height) * 60
}

pub fn unique_script(seed: i64) -> Script {
    Script::new(seed.to_le_bytes().to_vec())
}

pub struct MnHandle {
    pub collateral_key: KeyPair,
    pub operator_key: KeyPair,
    pub outpoint: OutPoint,
    pub script: Script,
}

pub struct TestNode {
    pub ctx: MasternodeContext,
    pub host: ChainState,
    pub now: i64,
    _dir: TempDir,
}

impl TestNode {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let ctx = MasternodeContext::new(dir.path(), NetworkParams::regtest());
        ctx.sync.force_synced();
        TestNode {
            ctx,
            host: ChainState::new(),
            now: NOW,
            _dir: dir,
        }
    }

    /// A node with `height + 1` connected blocks (genesis at height 0)
    pub fn with_chain(height: i64) -> Self {
        let mut node = TestNode::new();
        while node.host.height() < height {
            node.connect(vec![]);
        }
        node
    }

    /// Connect one block carrying the given extra transactions
    pub fn connect(&mut self, extra: Vec<Transaction>) -> Arc<BlockIndex> {
        let height = self.host.height() + 1;
        let coinbase = Transaction::new(vec![], vec![TxOut::new(1, unique_script(height))]);
        let mut transactions = vec![coinbase];
        transactions.extend(extra);
        self.connect_raw(Block::new(
            self.host.best_hash(),
            block_time(height),
            transactions,
        ))
    }

    /// Connect a block whose coinbase pays the masternode payment to `payee`
    pub fn connect_paying(&mut self, payee: &Script) -> Arc<BlockIndex> {
        let height = self.host.height() + 1;
        let amount = self.ctx.masternode_payment(height);
        assert!(amount > 0, "no masternode payment at height {}", height);
        let coinbase = Transaction::new(
            vec![],
            vec![
                TxOut::new(1, unique_script(height)),
                TxOut::new(amount, payee.clone()),
            ],
        );
        self.connect_raw(Block::new(
            self.host.best_hash(),
            block_time(height),
            vec![coinbase],
        ))
    }

    pub fn connect_raw(&mut self, block: Block) -> Arc<BlockIndex> {
        let height = self.host.height() + 1;
        let pindex = self
            .host
            .connect_block(&block, height as u128, 1_000_000 * ember_core::COIN);
        assert!(self.ctx.connect_block(&self.host, &block, &pindex, self.now));
        pindex
    }

    /// Disconnect the tip through both the host state and the indices
    pub fn disconnect_tip(&mut self) -> (Arc<BlockIndex>, Block) {
        let (pindex, block) = self.host.disconnect_tip().expect("tip to disconnect");
        assert!(self.ctx.disconnect_block(&block, &pindex, self.now));
        (pindex, block)
    }

    /// Mine a collateral-funding output for a new masternode
    pub fn fund_collateral(&mut self) -> MnHandle {
        let handles = self.fund_collaterals(1);
        handles.into_iter().next().unwrap()
    }

    /// Fund several collaterals inside a single block
    pub fn fund_collaterals(&mut self, count: usize) -> Vec<MnHandle> {
        let amount = schedule::collateral(self.host.height() + 1);
        let mut handles = Vec::new();
        let mut txs = Vec::new();
        for _ in 0..count {
            let collateral_key = KeyPair::generate();
            let operator_key = KeyPair::generate();
            let script = Script::pay_to_key_hash(&collateral_key.public_key());
            let funding = Transaction::new(vec![], vec![TxOut::new(amount, script.clone())]);
            handles.push(MnHandle {
                outpoint: OutPoint::new(funding.txid(), 0),
                script,
                collateral_key,
                operator_key,
            });
            txs.push(funding);
        }
        self.connect(txs);
        handles
    }

    /// Insert a registry entry directly, bypassing announce validation
    pub fn register(&self, handle: &MnHandle, sig_time: i64, ping_time: i64) {
        let outpoint = handle.outpoint;
        let ping = Ping::new(outpoint, self.host.best_hash(), ping_time);
        let mn = Masternode {
            vin: TxIn::new(outpoint),
            addr: self.addr(),
            collateral_pubkey: handle.collateral_key.public_key(),
            operator_pubkey: handle.operator_key.public_key(),
            protocol_version: PROTOCOL_VERSION,
            sig_time,
            signature: Vec::new(),
            format: MessageFormat::SignatureHash,
            last_ping: Some(ping),
            state: MasternodeState::Enabled,
        };
        assert!(self.ctx.manager.add(mn), "masternode must register");
    }

    /// A mature registry entry: announced long ago, pinged recently
    pub fn register_mature(&self, handle: &MnHandle) {
        self.register(handle, self.now - 100_000, self.now - 1_000);
    }

    /// Build a fully signed announce for a funded collateral
    pub fn announce_for(&self, handle: &MnHandle, sig_time: i64) -> Announce {
        let ping_height = (self.host.height() - 6).max(0);
        let block_hash = self.host.chain.at(ping_height).unwrap().hash;

        let mut ping = Ping::new(handle.outpoint, block_hash, sig_time);
        ping.sign(
            &handle.operator_key,
            MessageFormat::SignatureHash,
            self.ctx.manager.ping_salt(),
        );

        let mut announce = Announce {
            vin: TxIn::new(handle.outpoint),
            addr: self.addr(),
            collateral_pubkey: handle.collateral_key.public_key(),
            operator_pubkey: handle.operator_key.public_key(),
            protocol_version: PROTOCOL_VERSION,
            sig_time,
            signature: Vec::new(),
            format: MessageFormat::SignatureHash,
            last_ping: ping,
        };
        announce.sign(&handle.collateral_key, MessageFormat::SignatureHash);
        announce
    }

    pub fn addr(&self) -> SocketAddr {
        "127.0.0.1:52972".parse().unwrap()
    }
}

/// Peer double recording everything pushed to it
#[derive(Default)]
pub struct RecordingPeer {
    pub messages: Mutex<Vec<NetMessage>>,
    pub inventory: Mutex<Vec<Inventory>>,
    pub dos: Mutex<u32>,
}

impl Peer for RecordingPeer {
    fn id(&self) -> u64 {
        7
    }

    fn addr(&self) -> SocketAddr {
        "10.1.2.3:52972".parse().unwrap()
    }

    fn push_message(&self, message: NetMessage) {
        self.messages.lock().unwrap().push(message);
    }

    fn push_inventory(&self, inventory: Inventory) {
        self.inventory.lock().unwrap().push(inventory);
    }

    fn misbehaving(&self, score: u32) {
        *self.dos.lock().unwrap() += score;
    }
}
