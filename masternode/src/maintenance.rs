//! Maintenance task
//!
//! Ticks once per second: drives sync, refreshes the local masternode's
//! own status every ping interval, and sweeps the registry once a minute.
//! Exits promptly when the shutdown channel fires.

use crate::context::MasternodeContext;
use crate::{current_time, MASTERNODE_PING_SECONDS};
use ember_core::ChainState;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;

pub async fn run_maintenance(
    ctx: Arc<MasternodeContext>,
    host: Arc<RwLock<ChainState>>,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!("masternode maintenance thread started");

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = interval.tick() => {
                tick += 1;
                let now = current_time();

                // one sync step per second
                ctx.sync.process(now);

                if !ctx.sync.is_blockchain_synced() {
                    continue;
                }

                // refresh our own masternode right after sync completes,
                // then once per ping interval
                if tick % MASTERNODE_PING_SECONDS as u64 == 1 {
                    let host = host.read().expect("chain state lock poisoned");
                    let mut active = ctx.active.lock().expect("active lock poisoned");
                    if let Err(e) = active.manage_status(&ctx.manager, &host, &ctx.params, now) {
                        log::debug!("local masternode status: {}", e);
                    }
                }

                if tick % 60 == 0 {
                    ctx.manager.check_and_remove(false, now);
                }
            }
        }
    }

    log::info!("masternode maintenance thread stopped");
}
