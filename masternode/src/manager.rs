//! Masternode manager: the triple-indexed registry and message processing
//!
//! Records live in a single owning store keyed by a dense id; the three
//! lookup maps (collateral outpoint, collateral script, operator key) hold
//! ids and are only ever mutated together, inside one critical section.

use crate::collaterals::CollateralTracker;
use crate::masternode::{broadcast_hash, Announce, Masternode, MasternodeState, Ping};
use crate::net::{InvType, Inventory, NetMessage, Peer, MASTERNODE_SYNC_LIST};
use crate::sync::SyncState;
use crate::{
    MASTERNODES_DSEG_SECONDS, MASTERNODE_EXPIRATION_SECONDS, MASTERNODE_FUTURE_SIGTIME,
    MASTERNODE_MIN_CONFIRMATIONS, MASTERNODE_MIN_MNB_SECONDS, MASTERNODE_MIN_MNP_SECONDS,
    MASTERNODE_PING_BLOCK_DEPTH, MASTERNODE_REMOVAL_SECONDS, MIN_PEER_MNANNOUNCE,
};
use ember_core::{
    Amount, Block, BlockIndex, ChainState, Hash256, Height, NetworkParams, OutPoint, Script,
};
use ember_rewards::schedule;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};

/// Outcome of processing a network message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Entry accepted and should be relayed
    Accepted,
    /// Existing entry refreshed
    Updated,
    /// Collateral not yet confirmed; not the peer's fault, retry later
    Pending,
    /// Duplicate of something already processed
    Seen,
    /// Silently dropped (stale, out of window, not relevant)
    Ignored,
    /// Rejected; a non-zero score punishes the peer
    Rejected(u32),
    /// Ping for a masternode we do not know; ask the peer for its announce
    Unknown,
}

type MasternodeId = u64;

#[derive(Default)]
struct RegistryInner {
    next_id: MasternodeId,
    store: HashMap<MasternodeId, Masternode>,
    by_outpoint: HashMap<OutPoint, MasternodeId>,
    by_script: HashMap<Script, MasternodeId>,
    by_pubkey: HashMap<Vec<u8>, MasternodeId>,
}

impl RegistryInner {
    fn insert(&mut self, mn: Masternode) -> MasternodeId {
        let id = self.next_id;
        self.next_id += 1;
        self.by_outpoint.insert(mn.outpoint(), id);
        self.by_script.insert(mn.payee_script(), id);
        self.by_pubkey.insert(mn.operator_pubkey.clone(), id);
        self.store.insert(id, mn);
        id
    }

    fn evict(&mut self, id: MasternodeId) -> Option<Masternode> {
        let mn = self.store.remove(&id)?;
        self.by_outpoint.remove(&mn.outpoint());
        self.by_script.remove(&mn.payee_script());
        self.by_pubkey.remove(&mn.operator_pubkey);
        Some(mn)
    }
}

/// Per-peer bookkeeping for network messages, serialized separately from
/// the registry itself
#[derive(Default)]
struct MessageBook {
    seen_broadcasts: HashMap<Hash256, Announce>,
    seen_pings: HashMap<Hash256, Ping>,
    asked_us_for_list: HashMap<SocketAddr, i64>,
    we_asked_for_list: HashMap<SocketAddr, i64>,
    we_asked_for_entry: HashMap<OutPoint, i64>,
    /// Runtime salt mixed into ping hashes; changing it rolls the seen-map
    ping_salt: i64,
}

pub struct MasternodeManager {
    params: NetworkParams,
    inner: RwLock<RegistryInner>,
    book: Mutex<MessageBook>,
    tracker: Mutex<CollateralTracker>,
    /// Serializes handling of announce/ping/getlist so a peer cannot
    /// interleave registry mutations
    message_lock: Mutex<()>,
    /// Cooperative cancellation for long scans
    pub interrupt: AtomicBool,
}

impl MasternodeManager {
    pub fn new(params: NetworkParams) -> Self {
        MasternodeManager {
            params,
            inner: RwLock::new(RegistryInner::default()),
            book: Mutex::new(MessageBook::default()),
            tracker: Mutex::new(CollateralTracker::new()),
            message_lock: Mutex::new(()),
            interrupt: AtomicBool::new(false),
        }
    }

    pub fn params(&self) -> &NetworkParams {
        &self.params
    }

    /// Insert a new masternode. A different masternode already holding the
    /// same collateral script is evicted first (the newer broadcast wins);
    /// a duplicate outpoint is rejected. Returns whether it was added.
    pub fn add(&self, mn: Masternode) -> bool {
        if !mn.is_enabled() {
            return false;
        }

        let mut inner = self.inner.write().expect("registry lock poisoned");

        if let Some(&script_id) = inner.by_script.get(&mn.payee_script()) {
            let same_outpoint = inner
                .store
                .get(&script_id)
                .map(|other| other.outpoint() == mn.outpoint())
                .unwrap_or(false);
            if !same_outpoint {
                log::info!(
                    "Evicting masternode with duplicate collateral script, outpoint {}",
                    mn.outpoint()
                );
                inner.evict(script_id);
            }
        }

        if inner.by_outpoint.contains_key(&mn.outpoint()) {
            return false;
        }

        log::info!(
            "Adding new masternode {} - count {} now",
            mn.outpoint(),
            inner.store.len() + 1
        );
        inner.insert(mn);
        true
    }

    /// Erase the masternode anchored at `outpoint` from the registry
    pub fn remove(&self, outpoint: &OutPoint) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(&id) = inner.by_outpoint.get(outpoint) {
            log::info!(
                "Removing masternode {} - {} now",
                outpoint,
                inner.store.len() - 1
            );
            inner.evict(id);
        }
    }

    pub fn find(&self, outpoint: &OutPoint) -> Option<Masternode> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .by_outpoint
            .get(outpoint)
            .and_then(|id| inner.store.get(id))
            .cloned()
    }

    pub fn find_by_script(&self, script: &Script) -> Option<Masternode> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .by_script
            .get(script)
            .and_then(|id| inner.store.get(id))
            .cloned()
    }

    pub fn find_by_pubkey(&self, operator_pubkey: &[u8]) -> Option<Masternode> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .by_pubkey
            .get(operator_pubkey)
            .and_then(|id| inner.store.get(id))
            .cloned()
    }

    pub fn size(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").store.len()
    }

    /// (store, outpoint index, script index, operator-key index) sizes
    pub fn index_sizes(&self) -> (usize, usize, usize, usize) {
        let inner = self.inner.read().expect("registry lock poisoned");
        (
            inner.store.len(),
            inner.by_outpoint.len(),
            inner.by_script.len(),
            inner.by_pubkey.len(),
        )
    }

    /// Refresh every state and count the enabled entries
    pub fn count_enabled(&self, now: i64) -> usize {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner
            .store
            .values_mut()
            .map(|mn| {
                mn.check(now);
                mn.is_enabled()
            })
            .filter(|enabled| *enabled)
            .count()
    }

    /// Checked snapshot of every enabled masternode
    pub fn enabled_snapshot(&self, now: i64) -> Vec<Masternode> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        let mut snapshot: Vec<Masternode> = inner
            .store
            .values_mut()
            .filter_map(|mn| {
                mn.check(now);
                mn.is_enabled().then(|| mn.clone())
            })
            .collect();
        // deterministic order for deterministic selection
        snapshot.sort_by_key(|mn| mn.outpoint());
        snapshot
    }

    /// Refresh states, then delete removed/spent entries (and expired ones
    /// when forced), and age out the message bookkeeping.
    pub fn check_and_remove(&self, force_expired: bool, now: i64) {
        let mut dropped_vins = Vec::new();
        {
            let mut inner = self.inner.write().expect("registry lock poisoned");
            let doomed: Vec<MasternodeId> = inner
                .store
                .iter_mut()
                .filter_map(|(&id, mn)| {
                    mn.check(now);
                    let doomed = matches!(
                        mn.state,
                        MasternodeState::Removed | MasternodeState::VinSpent
                    ) || (force_expired && mn.state == MasternodeState::Expired);
                    doomed.then_some(id)
                })
                .collect();

            for id in doomed {
                if let Some(mn) = inner.evict(id) {
                    log::info!(
                        "Removing inactive masternode {} - {} now",
                        mn.outpoint(),
                        inner.store.len()
                    );
                    dropped_vins.push(mn.vin.prevout);
                }
            }
        }

        let mut book = self.book.lock().expect("book lock poisoned");

        // dropping the seen broadcast lets the node re-learn a masternode
        // from a later ping without a brand-new announce
        book.seen_broadcasts
            .retain(|_, announce| !dropped_vins.contains(&announce.outpoint()));
        book.we_asked_for_entry
            .retain(|outpoint, _| !dropped_vins.contains(outpoint));

        book.asked_us_for_list.retain(|_, &mut until| until >= now);
        book.we_asked_for_list.retain(|_, &mut until| until >= now);
        book.we_asked_for_entry.retain(|_, &mut until| until >= now);
        book.seen_broadcasts.retain(|_, announce| {
            announce.last_ping.sig_time >= now - MASTERNODE_REMOVAL_SECONDS * 2
        });
        book.seen_pings
            .retain(|_, ping| ping.sig_time >= now - MASTERNODE_REMOVAL_SECONDS * 2);
    }

    /// Transition the masternode holding this payout script to VinSpent
    pub fn set_vin_spent(&self, script: &Script) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(&id) = inner.by_script.get(script) {
            if let Some(mn) = inner.store.get_mut(&id) {
                mn.state = MasternodeState::VinSpent;
            }
        }
    }

    /// Re-derive the state of a masternode whose collateral reappeared in
    /// a reorg; the VinSpent terminal state does not survive the undo.
    fn revive(&self, script: &Script, now: i64) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if let Some(&id) = inner.by_script.get(script) {
            if let Some(mn) = inner.store.get_mut(&id) {
                if mn.state == MasternodeState::VinSpent {
                    mn.state = MasternodeState::Enabled;
                    mn.check(now);
                }
            }
        }
    }

    pub fn ping_salt(&self) -> i64 {
        self.book.lock().expect("book lock poisoned").ping_salt
    }

    /// Update the runtime ping salt. Previously seen pings hash differently
    /// under the new salt, so the seen-map is cleared wholesale.
    pub fn set_ping_salt(&self, salt: i64) {
        let mut book = self.book.lock().expect("book lock poisoned");
        if book.ping_salt != salt {
            book.ping_salt = salt;
            book.seen_pings.clear();
        }
    }

    // ---- network message processing ----

    /// Entry point for masternode messages from the network layer
    pub fn process_message(
        &self,
        peer: &dyn Peer,
        message: NetMessage,
        host: &ChainState,
        sync: &SyncState,
        now: i64,
    ) {
        if !sync.is_blockchain_synced() {
            return;
        }

        let _guard = self.message_lock.lock().expect("message lock poisoned");

        match message {
            NetMessage::Broadcast(announce) => {
                match self.process_announce(&announce, host, sync, now) {
                    Verdict::Rejected(score) if score > 0 => peer.misbehaving(score),
                    Verdict::Accepted | Verdict::Updated => {
                        peer.push_inventory(Inventory {
                            kind: InvType::MasternodeAnnounce,
                            hash: announce.hash(),
                        });
                    }
                    _ => {}
                }
            }
            NetMessage::Ping(ping) => match self.process_ping(&ping, host, now) {
                Verdict::Rejected(score) if score > 0 => peer.misbehaving(score),
                Verdict::Unknown => self.ask_for_entry(peer, ping.outpoint(), now),
                Verdict::Accepted => {
                    peer.push_inventory(Inventory {
                        kind: InvType::MasternodePing,
                        hash: ping.hash(self.ping_salt()),
                    });
                }
                _ => {}
            },
            NetMessage::GetList(which) => self.process_get_list(peer, which, now),
            NetMessage::SyncStatusCount { item, count } => {
                if item == MASTERNODE_SYNC_LIST {
                    sync.note_status_count(count, now);
                }
            }
        }
    }

    /// Validate an announce and add or refresh the registry entry
    pub fn process_announce(
        &self,
        announce: &Announce,
        host: &ChainState,
        sync: &SyncState,
        now: i64,
    ) -> Verdict {
        let hash = announce.hash();
        {
            let mut book = self.book.lock().expect("book lock poisoned");
            if book.seen_broadcasts.contains_key(&hash) {
                sync.added_masternode_list(hash, now);
                return Verdict::Seen;
            }
            book.seen_broadcasts.insert(hash, announce.clone());
        }

        // announce from the future (the past is fine)
        if announce.sig_time > now + MASTERNODE_FUTURE_SIGTIME {
            log::debug!("mnb - signature too far into the future {}", announce.outpoint());
            return Verdict::Ignored;
        }

        // ping must at least carry sane times
        if !ping_times_plausible(&announce.last_ping, now) {
            return Verdict::Ignored;
        }

        // malformed keys cannot derive a standard payout script
        let dos = &self.params.dos_scores;
        if Script::pay_to_key_hash(&announce.collateral_pubkey).len() != 25
            || announce.collateral_pubkey.len() != 32
            || announce.operator_pubkey.len() != 32
        {
            log::debug!("mnb - pubkey the wrong size");
            return Verdict::Rejected(dos.malformed_key);
        }

        if !announce.vin.script_sig.is_empty() {
            log::debug!("mnb - ignoring non-empty scriptSig {}", announce.outpoint());
            return Verdict::Ignored;
        }

        if !announce.verify_signature() {
            // legacy-version announces still carry the old message format
            let score = if announce.protocol_version <= MIN_PEER_MNANNOUNCE {
                0
            } else {
                dos.bad_signature
            };
            log::debug!("mnb - bad announce signature {}", announce.outpoint());
            return Verdict::Rejected(score);
        }

        if announce.addr.port() != self.params.default_port && !self.params.is_regtest() {
            log::debug!(
                "mnb - invalid port {} for masternode {}",
                announce.addr.port(),
                announce.outpoint()
            );
            return Verdict::Ignored;
        }

        // update path for a masternode we already track
        if let Some(existing) = self.find(&announce.outpoint()) {
            // older or equal than what we have: fishy, drop it
            if existing.sig_time >= announce.sig_time {
                return Verdict::Ignored;
            }

            if existing.is_enabled() {
                if existing.collateral_pubkey == announce.collateral_pubkey
                    && now - existing.sig_time >= MASTERNODE_MIN_MNB_SECONDS
                {
                    // the ping must verify against the key we know
                    if !announce.last_ping.verify(&existing.operator_pubkey, self.ping_salt()) {
                        return Verdict::Rejected(dos.bad_ping_signature);
                    }
                    let updated = {
                        let mut inner = self.inner.write().expect("registry lock poisoned");
                        match inner
                            .by_outpoint
                            .get(&announce.outpoint())
                            .copied()
                            .and_then(|id| inner.store.get_mut(&id))
                        {
                            Some(mn) => {
                                let updated = mn.update_from_announce(announce);
                                if updated {
                                    mn.check(now);
                                }
                                updated
                            }
                            None => false,
                        }
                    };
                    if updated {
                        sync.added_masternode_list(hash, now);
                        return Verdict::Updated;
                    }
                }
                return Verdict::Ignored;
            }

            // known but not enabled: drop the stale record and fall through
            // to a full re-add
            self.remove(&announce.outpoint());
        }

        // the declared collateral must actually belong to the declared key
        match host.coins.coin(&announce.outpoint()) {
            Some(coin)
                if coin.out.script_pubkey == announce.payee_script()
                    && schedule::is_collateral_amount(coin.value()) => {}
            _ => {
                log::info!("mnb - got mismatched pubkey and vin {}", announce.outpoint());
                return Verdict::Rejected(dos.mismatched_input);
            }
        }

        let tip_height = host.height();

        // not confirmed deep enough yet: likely our view is behind, let the
        // announce come around again without punishing anyone
        if host
            .coins
            .coin_depth_at_height(&announce.outpoint(), tip_height)
            < MASTERNODE_MIN_CONFIRMATIONS
        {
            log::debug!(
                "mnb - input must have at least {} confirmations",
                MASTERNODE_MIN_CONFIRMATIONS
            );
            let mut book = self.book.lock().expect("book lock poisoned");
            book.seen_broadcasts.remove(&hash);
            return Verdict::Pending;
        }

        // sigTime must postdate the block where the collateral reached its
        // confirmation count, and the collateral value must match the
        // schedule there (or one week later, tolerating imminent changes)
        if let Some((_, block_hash)) = host.tx_index.get_transaction(&announce.outpoint().txid) {
            if let Some(mined) = host.chain.block_index(block_hash) {
                let conf_height = mined.height + MASTERNODE_MIN_CONFIRMATIONS - 1;
                if let Some(conf_index) = host.chain.at(conf_height) {
                    if conf_index.time > announce.sig_time {
                        log::debug!(
                            "mnb - bad sigTime {} for masternode {}",
                            announce.sig_time,
                            announce.outpoint()
                        );
                        return Verdict::Ignored;
                    }

                    let current = schedule::collateral(tip_height);
                    let week = self.params.blocks_per_week();
                    if schedule::collateral(conf_height) != current
                        && schedule::collateral(conf_height + week) != current
                    {
                        log::debug!(
                            "mnb - wrong collateral value for masternode {}",
                            announce.outpoint()
                        );
                        return Verdict::Ignored;
                    }
                }
            }
        }

        // fresh records start enabled; the next check() derives the real
        // state from the ping age
        let mn = Masternode::from_announce(announce);
        if self.add(mn) {
            log::info!("mnb - got new masternode entry {}", announce.outpoint());
            sync.added_masternode_list(hash, now);
            Verdict::Accepted
        } else {
            Verdict::Ignored
        }
    }

    /// Validate a ping and refresh the masternode's liveness
    pub fn process_ping(&self, ping: &Ping, host: &ChainState, now: i64) -> Verdict {
        if ping.sig_time > now + MASTERNODE_FUTURE_SIGTIME {
            log::debug!("mnp - signature too far into the future {}", ping.outpoint());
            return Verdict::Ignored;
        }
        if ping.sig_time <= now - MASTERNODE_EXPIRATION_SECONDS {
            log::debug!("mnp - signature too far into the past {}", ping.outpoint());
            return Verdict::Ignored;
        }

        let salt = self.ping_salt();
        {
            let mut book = self.book.lock().expect("book lock poisoned");
            let hash = ping.hash(salt);
            if book.seen_pings.contains_key(&hash) {
                return Verdict::Seen;
            }
            book.seen_pings.insert(hash, ping.clone());
        }

        let mn = match self.find(&ping.outpoint()) {
            Some(mn) => mn,
            None => return Verdict::Unknown,
        };

        // rate limit: accept only if quiet for most of the ping interval
        if mn.is_pinged_within(MASTERNODE_MIN_MNP_SECONDS - 60, ping.sig_time) {
            log::debug!("mnp - ping arrived too early {}", ping.outpoint());
            return Verdict::Ignored;
        }

        if !ping.verify(&mn.operator_pubkey, salt) {
            return Verdict::Rejected(self.params.dos_scores.bad_ping_signature);
        }

        // the referenced block must be on the main chain, near the tip
        let index = match host.chain.block_index(&ping.block_hash) {
            Some(index) => index,
            None => {
                log::debug!("mnp - ping block not on disk {}", ping.outpoint());
                return Verdict::Ignored;
            }
        };
        if !host.chain.contains(&index)
            || host.height() - index.height > MASTERNODE_PING_BLOCK_DEPTH
        {
            log::debug!(
                "mnp - block hash {} too old or off-chain",
                ping.block_hash
            );
            return Verdict::Ignored;
        }

        let enabled = {
            let mut inner = self.inner.write().expect("registry lock poisoned");
            match inner
                .by_outpoint
                .get(&ping.outpoint())
                .copied()
                .and_then(|id| inner.store.get_mut(&id))
            {
                Some(mn) => {
                    mn.last_ping = Some(ping.clone());
                    mn.check(now);
                    mn.is_enabled()
                }
                None => false,
            }
        };

        // the cached broadcast carries a ping too; keep it current
        {
            let mut book = self.book.lock().expect("book lock poisoned");
            let bhash = broadcast_hash(mn.sig_time, &mn.collateral_pubkey);
            if let Some(cached) = book.seen_broadcasts.get_mut(&bhash) {
                cached.last_ping = ping.clone();
            }
        }

        if enabled {
            log::debug!("mnp - masternode ping accepted {}", ping.outpoint());
            Verdict::Accepted
        } else {
            Verdict::Ignored
        }
    }

    /// Answer a GETMNLIST request, throttled per peer for full-list asks
    pub fn process_get_list(&self, peer: &dyn Peer, which: Option<OutPoint>, now: i64) {
        match which {
            None => {
                let local = peer.addr().ip().is_loopback();
                if !local && self.params.network == ember_core::Network::Main {
                    let mut book = self.book.lock().expect("book lock poisoned");
                    if let Some(&until) = book.asked_us_for_list.get(&peer.addr()) {
                        if now < until {
                            log::debug!("dseg - peer {} already asked for the list", peer.id());
                            return;
                        }
                    }
                    book.asked_us_for_list
                        .insert(peer.addr(), now + MASTERNODES_DSEG_SECONDS);
                }

                let mut count = 0u32;
                for mn in self.enabled_snapshot(now) {
                    if let Some(announce) = Announce::from_masternode(&mn) {
                        let hash = announce.hash();
                        peer.push_inventory(Inventory {
                            kind: InvType::MasternodeAnnounce,
                            hash,
                        });
                        count += 1;

                        let mut book = self.book.lock().expect("book lock poisoned");
                        book.seen_broadcasts.entry(hash).or_insert(announce);
                    }
                }

                peer.push_message(NetMessage::SyncStatusCount {
                    item: MASTERNODE_SYNC_LIST,
                    count,
                });
                log::debug!("dseg - sent {} masternode entries to peer {}", count, peer.id());
            }
            Some(outpoint) => {
                if let Some(mn) = self.find(&outpoint) {
                    if mn.is_enabled() {
                        if let Some(announce) = Announce::from_masternode(&mn) {
                            let hash = announce.hash();
                            peer.push_inventory(Inventory {
                                kind: InvType::MasternodeAnnounce,
                                hash,
                            });
                            let mut book = self.book.lock().expect("book lock poisoned");
                            book.seen_broadcasts.entry(hash).or_insert(announce);
                        }
                    }
                }
            }
        }
    }

    /// Ask a peer for the announce behind an unknown ping, with backoff
    pub fn ask_for_entry(&self, peer: &dyn Peer, outpoint: OutPoint, now: i64) {
        let mut book = self.book.lock().expect("book lock poisoned");
        if let Some(&until) = book.we_asked_for_entry.get(&outpoint) {
            if now < until {
                return;
            }
        }
        log::debug!("asking for missing masternode entry {}", outpoint);
        peer.push_message(NetMessage::GetList(Some(outpoint)));
        book.we_asked_for_entry
            .insert(outpoint, now + MASTERNODE_MIN_MNP_SECONDS);
    }

    // ---- block-driven index maintenance ----

    /// Feed a connected block through the collateral and payment indices
    pub fn connect_block(
        &self,
        host: &ChainState,
        payment_at: &dyn Fn(Height) -> Amount,
        block: &Block,
        pindex: &Arc<BlockIndex>,
        now: i64,
    ) -> bool {
        let spent = {
            let mut tracker = self.tracker.lock().expect("collateral lock poisoned");
            match tracker.connect_block(
                host,
                &self.params,
                payment_at,
                block,
                pindex,
                now,
                &self.interrupt,
            ) {
                Some(spent) => spent,
                None => return false,
            }
        };

        for script in spent {
            self.set_vin_spent(&script);
        }
        true
    }

    /// Undo a disconnected block in the collateral and payment indices
    pub fn disconnect_block(
        &self,
        block: &Block,
        pindex: &BlockIndex,
        now: i64,
    ) -> bool {
        let restored = {
            let mut tracker = self.tracker.lock().expect("collateral lock poisoned");
            tracker.disconnect_block(&self.params, block, pindex, now)
        };

        for script in restored {
            self.revive(&script, now);
        }
        true
    }

    // ---- collateral and payment queries ----

    pub fn has_collateral(&self, script: &Script) -> bool {
        self.tracker
            .lock()
            .expect("collateral lock poisoned")
            .has_collateral(script)
    }

    pub fn get_collateral(&self, script: &Script) -> Option<ember_core::Coin> {
        self.tracker
            .lock()
            .expect("collateral lock poisoned")
            .collateral(script)
    }

    pub fn blocks_since_payment(
        &self,
        script: &Script,
        pindex: &Arc<BlockIndex>,
        host: &ChainState,
        payment_at: &dyn Fn(Height) -> Amount,
    ) -> Height {
        self.tracker
            .lock()
            .expect("collateral lock poisoned")
            .blocks_since_payment(script, pindex, host, payment_at)
    }

    pub fn last_paid_time(&self, script: &Script, pindex: &BlockIndex) -> i64 {
        self.tracker
            .lock()
            .expect("collateral lock poisoned")
            .last_paid_time(script, pindex)
    }

    pub fn collateral_count(&self) -> usize {
        self.tracker
            .lock()
            .expect("collateral lock poisoned")
            .collateral_count()
    }

    // ---- persistence support ----

    /// Every record, for the cache file
    pub fn snapshot(&self) -> Vec<Masternode> {
        let inner = self.inner.read().expect("registry lock poisoned");
        let mut entries: Vec<Masternode> = inner.store.values().cloned().collect();
        entries.sort_by_key(|mn| mn.outpoint());
        entries
    }

    /// Restore the registry from a cache snapshot, then drop whatever did
    /// not survive its age checks
    pub fn load_snapshot(&self, entries: Vec<Masternode>, now: i64) {
        {
            let mut inner = self.inner.write().expect("registry lock poisoned");
            *inner = RegistryInner::default();
            for mn in entries {
                inner.insert(mn);
            }
        }
        self.check_and_remove(true, now);
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        *inner = RegistryInner::default();
        let mut book = self.book.lock().expect("book lock poisoned");
        *book = MessageBook::default();
        self.tracker
            .lock()
            .expect("collateral lock poisoned")
            .reset();
    }

}

/// Basic sigTime sanity shared by announce-embedded pings
fn ping_times_plausible(ping: &Ping, now: i64) -> bool {
    if ping.sig_time > now + MASTERNODE_FUTURE_SIGTIME {
        return false;
    }
    if ping.sig_time <= now - MASTERNODE_EXPIRATION_SECONDS {
        return false;
    }
    true
}
