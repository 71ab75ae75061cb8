//! Payment selection and validation
//!
//! Selection orders the enabled masternodes by seconds since their last
//! on-chain payment and takes the oldest-paid head of the eligible set.
//! Validation accepts a block's payout only if the recipient is being paid
//! no faster than the shortest-depth eligible masternode permits.

use crate::manager::MasternodeManager;
use crate::masternode::Masternode;
use crate::sync::SyncState;
use ember_core::{
    Amount, Block, BlockIndex, ChainState, Height, OutPoint, Script, Transaction, TxOut,
    MONTH_IN_SECONDS,
};
use ember_rewards::RewardEngine;
use std::sync::Arc;

/// Result of a payee selection run
#[derive(Debug, Clone)]
pub struct Selection {
    /// The masternode that should be paid next
    pub best: Option<Masternode>,
    /// The top `max(10, 5%)` of masternodes by seconds-since-payment
    pub eligible: Vec<OutPoint>,
    /// Candidates that survived the filters, before ranking
    pub candidates: usize,
}

/// Seconds since this masternode was last paid, as seen from `pindex`.
/// Never-paid masternodes substitute their announce time; when even that
/// yields an implausibly old result, a deterministic stand-in beyond one
/// month keeps the ordering stable.
pub fn seconds_since_payment(
    mn: &Masternode,
    pindex: &Arc<BlockIndex>,
    manager: &MasternodeManager,
) -> i64 {
    let last_paid = manager.last_paid_time(&mn.payee_script(), pindex);
    let last_paid = last_paid.max(mn.sig_time);

    let seconds = pindex.time - last_paid;
    if seconds < MONTH_IN_SECONDS {
        seconds
    } else {
        mn.stale_payment_stand_in()
    }
}

/// Deterministically select the oldest-paid masternode and the eligible
/// set, as of the chain state at `pindex_prev`.
pub fn select_for_payment(
    manager: &MasternodeManager,
    host: &ChainState,
    pindex_prev: &Arc<BlockIndex>,
    filter_sig_time: bool,
    now: i64,
) -> Selection {
    let block_height = pindex_prev.height + 1;

    let enabled = manager.enabled_snapshot(now);
    let enabled_count = enabled.len() as i64;

    let mut scored: Vec<(i64, OutPoint)> = Vec::new();
    for mn in &enabled {
        // too new: wait for one full payment cycle
        if filter_sig_time && mn.sig_time + enabled_count * 60 > now {
            continue;
        }

        // the collateral needs as many confirmations as there are
        // masternodes in the queue
        if host
            .coins
            .coin_depth_at_height(&mn.outpoint(), block_height)
            < enabled_count
        {
            continue;
        }

        scored.push((seconds_since_payment(mn, pindex_prev, manager), mn.outpoint()));
    }

    let candidates = scored.len();

    // when the network is ramping up, don't penalize freshly restarted
    // masternodes; one retry without the sigTime filter
    if filter_sig_time && (candidates as i64) < enabled_count / 3 {
        return select_for_payment(manager, host, pindex_prev, false, now);
    }

    // oldest payment first; the outpoint breaks ties deterministically
    scored.sort_by(|a, b| b.cmp(a));

    let eligible_cap = 10usize.max(enabled.len() * 5 / 100);
    let mut best = None;
    let mut eligible = Vec::new();

    for (_, outpoint) in scored {
        let Some(mn) = manager.find(&outpoint) else {
            continue;
        };

        if best.is_none() {
            best = Some(mn);
        }

        eligible.push(outpoint);
        if eligible.len() >= eligible_cap {
            break;
        }
    }

    Selection {
        best,
        eligible,
        candidates,
    }
}

/// The payout script the next block should pay
pub fn get_block_payee(
    manager: &MasternodeManager,
    host: &ChainState,
    pindex_prev: &Arc<BlockIndex>,
    now: i64,
) -> Option<Script> {
    let selection = select_for_payment(manager, host, pindex_prev, true, now);
    let payee = selection.best.map(|mn| mn.payee_script());
    match &payee {
        Some(script) => log::debug!("next masternode payee {}", script),
        None => log::debug!("failed to find a masternode to pay"),
    }
    payee
}

/// Chain-facing acceptance check for a block's masternode payout
pub fn is_block_payee_valid(
    block: &Block,
    pindex_prev: &Arc<BlockIndex>,
    manager: &MasternodeManager,
    host: &ChainState,
    engine: &RewardEngine,
    sync: &SyncState,
    now: i64,
) -> bool {
    // no masternode data yet: find the longest chain instead of stalling
    if !sync.is_synced() {
        log::debug!("client not synced, skipping block payee checks");
        return true;
    }

    is_transaction_valid(block, pindex_prev, manager, host, engine, sync, now)
}

/// Verify the payout amount, the recipient's collateral, and the
/// recipient's eligibility against the rest of the registry
pub fn is_transaction_valid(
    block: &Block,
    pindex_prev: &Arc<BlockIndex>,
    manager: &MasternodeManager,
    host: &ChainState,
    engine: &RewardEngine,
    sync: &SyncState,
    now: i64,
) -> bool {
    if !sync.is_blockchain_synced() {
        return true;
    }

    let block_height = pindex_prev.height + 1;
    let required = engine.masternode_payment(block_height);
    let payment_at = |h: Height| -> Amount { engine.masternode_payment(h) };

    let Some(tx) = block.reward_transaction() else {
        return false;
    };

    let mut paid_payee: Option<Script> = None;
    for out in &tx.outputs {
        if out.value == required {
            paid_payee = Some(out.script_pubkey.clone());
        }
    }

    let Some(payee) = paid_payee else {
        log::debug!("missing required masternode payment of {}", required);
        return false;
    };

    // the paid script must hold a known collateral right now
    if !manager.has_collateral(&payee) {
        return false;
    }

    // without enabled masternodes or a synced list there is not enough
    // data for further judgement
    if manager.count_enabled(now) == 0 {
        log::debug!("no enabled masternodes, accepting payee");
        return true;
    }
    if !sync.is_synced() {
        return true;
    }

    let Some(collateral) = manager.get_collateral(&payee) else {
        return false;
    };
    if collateral.height == 0 {
        return false;
    }

    let mut last_paid_depth = manager.blocks_since_payment(&payee, pindex_prev, host, &payment_at);
    if last_paid_depth < 0 {
        last_paid_depth = pindex_prev.height - collateral.height;
    }

    let selection = select_for_payment(manager, host, pindex_prev, true, now);
    if selection.best.is_none() {
        return true;
    }

    let mut min_depth = Height::MAX;
    let mut max_depth = 0;
    for outpoint in &selection.eligible {
        let Some(mn) = manager.find(outpoint) else {
            continue;
        };
        let depth = manager.blocks_since_payment(&mn.payee_script(), pindex_prev, host, &payment_at);
        min_depth = min_depth.min(depth);
        max_depth = max_depth.max(depth);
    }
    if min_depth == Height::MAX {
        return true;
    }

    log::debug!(
        "eligible min/max depth {}/{}, paid depth {}",
        min_depth,
        max_depth,
        last_paid_depth
    );

    // reject if this payee is being paid faster than the shortest-depth
    // eligible masternode permits
    if last_paid_depth < min_depth {
        log::info!("invalid masternode payment detected at height {}", block_height);
        return false;
    }

    true
}

/// Producer side: add the masternode output to a coinbase or coinstake
/// under construction and charge it to the right outputs.
pub fn fill_block_payee(
    tx: &mut Transaction,
    pindex_prev: &Arc<BlockIndex>,
    proof_of_stake: bool,
    manager: &MasternodeManager,
    host: &ChainState,
    engine: &RewardEngine,
    now: i64,
) {
    let Some(payee) = get_block_payee(manager, host, pindex_prev, now) else {
        return;
    };

    let block_height = pindex_prev.height + 1;
    let payment = engine.masternode_payment(block_height);

    if proof_of_stake {
        // stake output layout: vout[0] is the empty marker, and the stake
        // reward may be split over several outputs; the masternode output
        // is appended after them
        let appended_at = tx.outputs.len();
        tx.outputs.push(TxOut::new(payment, payee.clone()));

        if appended_at == 2 {
            tx.outputs[appended_at - 1].value -= payment;
        } else if appended_at > 2 {
            let stake_outputs = (appended_at - 1) as Amount;
            let split = payment / stake_outputs;
            let remainder = payment - split * stake_outputs;
            for out in tx.outputs.iter_mut().take(appended_at).skip(1) {
                out.value -= split;
            }
            // the dust from an uneven division lands on the last one
            tx.outputs[appended_at - 1].value -= remainder;
        }
    } else {
        if tx.outputs.is_empty() {
            tx.outputs.push(TxOut::default());
        }
        tx.outputs.truncate(1);
        tx.outputs[0].value = engine.block_value(block_height) - payment;
        tx.outputs.push(TxOut::new(payment, payee.clone()));
    }

    log::debug!("masternode payment of {} to {}", payment, payee);
}
