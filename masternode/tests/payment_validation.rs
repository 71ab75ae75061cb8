//! Payment selection and block payout validation tests

mod common;

use common::{TestNode, NOW};
use ember_core::{Block, Script, Transaction, TxIn, TxOut, COIN, OutPoint};
use ember_masternode::payments;
use ember_rewards::schedule;

#[test]
fn masternode_share_of_a_25_coin_subsidy() {
    // 25 COIN base subsidy, 65% share
    assert_eq!(schedule::base_subsidy(1_000_001), 25 * COIN);
    assert_eq!(schedule::masternode_payment(1_000_001), 1_625_000_000);
}

#[test]
fn selection_is_deterministic() {
    let mut node = TestNode::with_chain(2_050);
    let handles = node.fund_collaterals(5);
    for handle in &handles {
        node.register_mature(handle);
    }
    for _ in 0..20 {
        node.connect(vec![]);
    }

    let prev = node.host.tip().unwrap();
    let first = payments::select_for_payment(&node.ctx.manager, &node.host, &prev, true, NOW);
    let second = payments::select_for_payment(&node.ctx.manager, &node.host, &prev, true, NOW);

    assert_eq!(
        first.best.as_ref().map(|mn| mn.outpoint()),
        second.best.as_ref().map(|mn| mn.outpoint())
    );
    assert_eq!(first.eligible, second.eligible);
    assert!(first.best.is_some());
}

#[test]
fn sig_time_filter_carve_out_returns_a_candidate() {
    let mut node = TestNode::with_chain(2_050);
    // twelve masternodes announced two minutes ago: the 60-seconds-per-node
    // filter excludes all of them on the first pass
    let handles = node.fund_collaterals(12);
    for handle in &handles {
        node.register(handle, NOW - 120, NOW + 480);
    }
    for _ in 0..15 {
        node.connect(vec![]);
    }

    let prev = node.host.tip().unwrap();
    let selection = payments::select_for_payment(&node.ctx.manager, &node.host, &prev, true, NOW);

    assert_eq!(selection.candidates, 12);
    assert!(selection.best.is_some());
    assert_eq!(selection.eligible.len(), 10);
}

#[test]
fn blocks_since_payment_is_negative_for_unknown_scripts() {
    let mut node = TestNode::with_chain(2_050);
    let handle = node.fund_collateral();
    node.register_mature(&handle);
    for _ in 0..5 {
        node.connect(vec![]);
    }

    let prev = node.host.tip().unwrap();
    let engine = node.ctx.engine.lock().unwrap();
    let payment_at = |h| engine.masternode_payment(h);

    // a known collateral that was never paid falls back to collateral age
    let depth =
        node.ctx
            .manager
            .blocks_since_payment(&handle.script, &prev, &node.host, &payment_at);
    assert!(depth > 0);

    // an unrelated script is not even a collateral
    let stranger = Script::new(vec![0xde, 0xad]);
    let depth =
        node.ctx
            .manager
            .blocks_since_payment(&stranger, &prev, &node.host, &payment_at);
    assert_eq!(depth, -1);
}

/// Ten never-paid masternodes whose collateral is 50 blocks deep, and one
/// masternode X paid only 10 blocks ago.
fn paid_too_fast_setup() -> (TestNode, common::MnHandle) {
    let mut node = TestNode::with_chain(2_050);

    let x = node.fund_collateral(); // height 2051
    node.register_mature(&x);
    for _ in 0..4 {
        node.connect(vec![]);
    }

    // ten more funded in one block at height 2056
    let others = node.fund_collaterals(10);
    for handle in &others {
        node.register_mature(handle);
    }

    // plain blocks up to 2095, X gets paid at 2096
    while node.host.height() < 2_095 {
        node.connect(vec![]);
    }
    node.connect_paying(&x.script); // 2096

    // ten more plain blocks: the candidate builds on height 2106
    while node.host.height() < 2_106 {
        node.connect(vec![]);
    }

    (node, x)
}

fn candidate_paying(node: &TestNode, payee: &Script) -> Block {
    let height = node.host.height() + 1;
    let amount = node.ctx.masternode_payment(height);
    let coinbase = Transaction::new(
        vec![],
        vec![
            TxOut::new(1, common::unique_script(height)),
            TxOut::new(amount, payee.clone()),
        ],
    );
    Block::new(node.host.best_hash(), common::block_time(height), vec![coinbase])
}

#[test]
fn block_paying_a_recently_paid_masternode_is_rejected() {
    let (node, x) = paid_too_fast_setup();
    let prev = node.host.tip().unwrap();

    // sanity: the eligible set's minimum depth is the others' collateral age
    let engine = node.ctx.engine.lock().unwrap();
    let payment_at = |h| engine.masternode_payment(h);
    assert_eq!(
        node.ctx
            .manager
            .blocks_since_payment(&x.script, &prev, &node.host, &payment_at),
        10
    );
    drop(engine);

    let block = candidate_paying(&node, &x.script);
    assert!(!node.ctx.is_block_payee_valid(&block, &prev, &node.host, NOW));
}

#[test]
fn block_paying_the_selected_masternode_is_accepted() {
    let (node, _x) = paid_too_fast_setup();
    let prev = node.host.tip().unwrap();

    let payee = node
        .ctx
        .get_block_payee(&prev, &node.host, NOW)
        .expect("a payee must be selectable");
    let block = candidate_paying(&node, &payee);
    assert!(node.ctx.is_block_payee_valid(&block, &prev, &node.host, NOW));
}

#[test]
fn block_without_the_masternode_output_is_rejected() {
    let (node, _x) = paid_too_fast_setup();
    let prev = node.host.tip().unwrap();

    let height = node.host.height() + 1;
    let coinbase = Transaction::new(vec![], vec![TxOut::new(1, common::unique_script(height))]);
    let block = Block::new(
        node.host.best_hash(),
        common::block_time(height),
        vec![coinbase],
    );
    assert!(!node.ctx.is_block_payee_valid(&block, &prev, &node.host, NOW));
}

#[test]
fn block_paying_an_unknown_script_is_rejected() {
    let (node, _x) = paid_too_fast_setup();
    let prev = node.host.tip().unwrap();

    let block = candidate_paying(&node, &Script::new(vec![0xbe, 0xef]));
    assert!(!node.ctx.is_block_payee_valid(&block, &prev, &node.host, NOW));
}

#[test]
fn unsynced_node_accepts_conservatively() {
    let mut node = TestNode::with_chain(2_050);
    node.ctx.sync.set_blockchain_synced(false);

    let prev = node.host.tip().unwrap();
    let block = candidate_paying(&node, &Script::new(vec![1, 2, 3]));
    assert!(node.ctx.is_block_payee_valid(&block, &prev, &node.host, NOW));
}

#[test]
fn fill_block_payee_proof_of_work() {
    let mut node = TestNode::with_chain(2_050);
    let handle = node.fund_collateral();
    node.register_mature(&handle);
    for _ in 0..20 {
        node.connect(vec![]);
    }

    let prev = node.host.tip().unwrap();
    let height = prev.height + 1;
    let payment = node.ctx.masternode_payment(height);
    let block_value = node.ctx.block_value(height);

    let mut coinbase = Transaction::new(vec![], vec![TxOut::new(0, Script::new(vec![7]))]);
    node.ctx
        .fill_block_payee(&mut coinbase, &prev, false, &node.host, NOW);

    assert_eq!(coinbase.outputs.len(), 2);
    assert_eq!(coinbase.outputs[1].value, payment);
    assert_eq!(coinbase.outputs[1].script_pubkey, handle.script);
    assert_eq!(coinbase.outputs[0].value, block_value - payment);
}

#[test]
fn fill_block_payee_single_stake_output() {
    let mut node = TestNode::with_chain(2_050);
    let handle = node.fund_collateral();
    node.register_mature(&handle);
    for _ in 0..20 {
        node.connect(vec![]);
    }

    let prev = node.host.tip().unwrap();
    let payment = node.ctx.masternode_payment(prev.height + 1);

    let stake_value = 10_000 * COIN;
    let mut coinstake = Transaction::new(
        vec![TxIn::new(OutPoint::default())],
        vec![TxOut::default(), TxOut::new(stake_value, Script::new(vec![9]))],
    );
    node.ctx
        .fill_block_payee(&mut coinstake, &prev, true, &node.host, NOW);

    assert_eq!(coinstake.outputs.len(), 3);
    assert_eq!(coinstake.outputs[2].value, payment);
    // the whole payment comes out of the single stake output
    assert_eq!(coinstake.outputs[1].value, stake_value - payment);
}

#[test]
fn fill_block_payee_split_stake_outputs() {
    let mut node = TestNode::with_chain(2_050);
    let handle = node.fund_collateral();
    node.register_mature(&handle);
    for _ in 0..20 {
        node.connect(vec![]);
    }

    let prev = node.host.tip().unwrap();
    let payment = node.ctx.masternode_payment(prev.height + 1);

    let half = 5_000 * COIN;
    let mut coinstake = Transaction::new(
        vec![TxIn::new(OutPoint::default())],
        vec![
            TxOut::default(),
            TxOut::new(half, Script::new(vec![9])),
            TxOut::new(half, Script::new(vec![9])),
        ],
    );
    node.ctx
        .fill_block_payee(&mut coinstake, &prev, true, &node.host, NOW);

    assert_eq!(coinstake.outputs.len(), 4);
    assert_eq!(coinstake.outputs[3].value, payment);
    // the payment is split across the stake outputs, remainder on the last
    let charged = 2 * half - coinstake.outputs[1].value - coinstake.outputs[2].value;
    assert_eq!(charged, payment);
    assert!(coinstake.outputs[1].value >= coinstake.outputs[2].value);
}
