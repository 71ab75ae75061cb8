//! Sync state oracle
//!
//! Tracks whether the blockchain itself is caught up (set by the embedding
//! node) and whether the masternode list sync has settled. Validation code
//! consults this to decide when it has enough data to judge a block.

use ember_core::Hash256;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// List additions are considered settled after this long without news
const LIST_SETTLE_SECONDS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    WaitingForBlocks,
    List,
    Finished,
}

struct SyncInner {
    phase: Phase,
    last_list_update: i64,
    seen_list_items: HashSet<Hash256>,
}

pub struct SyncState {
    blockchain_synced: AtomicBool,
    inner: Mutex<SyncInner>,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncState {
    pub fn new() -> Self {
        SyncState {
            blockchain_synced: AtomicBool::new(false),
            inner: Mutex::new(SyncInner {
                phase: Phase::WaitingForBlocks,
                last_list_update: 0,
                seen_list_items: HashSet::new(),
            }),
        }
    }

    /// Set by the embedding node once headers/blocks are caught up
    pub fn set_blockchain_synced(&self, synced: bool) {
        self.blockchain_synced.store(synced, Ordering::Relaxed);
        if !synced {
            self.reset();
        }
    }

    pub fn is_blockchain_synced(&self) -> bool {
        self.blockchain_synced.load(Ordering::Relaxed)
    }

    /// Whether the masternode list sync has finished as well
    pub fn is_synced(&self) -> bool {
        let inner = self.inner.lock().expect("sync lock poisoned");
        inner.phase == Phase::Finished
    }

    /// A new or refreshed masternode list entry arrived
    pub fn added_masternode_list(&self, hash: Hash256, now: i64) {
        let mut inner = self.inner.lock().expect("sync lock poisoned");
        if inner.seen_list_items.insert(hash) {
            inner.last_list_update = now;
        }
    }

    /// A peer reported how many list entries it pushed us; a non-empty
    /// report means list entries are still in flight
    pub fn note_status_count(&self, count: u32, now: i64) {
        if count == 0 {
            return;
        }
        let mut inner = self.inner.lock().expect("sync lock poisoned");
        inner.last_list_update = now;
    }

    /// Advance the state machine; called once per maintenance tick
    pub fn process(&self, now: i64) {
        if !self.is_blockchain_synced() {
            return;
        }

        let mut inner = self.inner.lock().expect("sync lock poisoned");
        match inner.phase {
            Phase::WaitingForBlocks => {
                inner.phase = Phase::List;
                inner.last_list_update = now;
            }
            Phase::List => {
                if now - inner.last_list_update > LIST_SETTLE_SECONDS {
                    log::info!("Masternode list sync finished");
                    inner.phase = Phase::Finished;
                }
            }
            Phase::Finished => {}
        }
    }

    pub fn reset(&self) {
        let mut inner = self.inner.lock().expect("sync lock poisoned");
        inner.phase = Phase::WaitingForBlocks;
        inner.seen_list_items.clear();
    }

    /// Test hook: jump straight to fully synced
    pub fn force_synced(&self) {
        self.blockchain_synced.store(true, Ordering::Relaxed);
        let mut inner = self.inner.lock().expect("sync lock poisoned");
        inner.phase = Phase::Finished;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_progression() {
        let sync = SyncState::new();
        assert!(!sync.is_blockchain_synced());
        assert!(!sync.is_synced());

        sync.set_blockchain_synced(true);
        sync.process(1_000);
        assert!(!sync.is_synced());

        // quiet list window elapses
        sync.process(1_000 + LIST_SETTLE_SECONDS + 1);
        assert!(sync.is_synced());
    }

    #[test]
    fn test_list_updates_defer_completion() {
        let sync = SyncState::new();
        sync.set_blockchain_synced(true);
        sync.process(1_000);

        sync.added_masternode_list(Hash256::double_sha256(b"mn"), 1_020);
        sync.process(1_040);
        assert!(!sync.is_synced());

        sync.process(1_020 + LIST_SETTLE_SECONDS + 1);
        assert!(sync.is_synced());
    }

    #[test]
    fn test_losing_blockchain_sync_resets() {
        let sync = SyncState::new();
        sync.force_synced();
        assert!(sync.is_synced());

        sync.set_blockchain_synced(false);
        assert!(!sync.is_synced());
    }
}
