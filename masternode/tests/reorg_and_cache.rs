//! Reorganization and persistence tests

mod common;

use common::{TestNode, NOW};
use ember_core::{ChainState, NetworkParams, Script, Transaction, TxIn, TxOut};
use ember_masternode::cache::ReadResult;
use ember_masternode::masternode::MasternodeState;
use ember_masternode::MasternodeContext;

/// Spend the collateral at the tip, minus a fee so the change is not a
/// fresh collateral itself
fn spend_tx(node: &TestNode, handle: &common::MnHandle) -> Transaction {
    let coin = node
        .ctx
        .manager
        .get_collateral(&handle.script)
        .expect("collateral must be indexed");
    Transaction::new(
        vec![TxIn::new(handle.outpoint)],
        vec![TxOut::new(coin.value() - 10_000, Script::new(vec![0x77]))],
    )
}

#[test]
fn spending_collateral_marks_vin_spent_and_reorg_revives() {
    let mut node = TestNode::with_chain(2_050);
    let handle = node.fund_collateral();
    node.register_mature(&handle);
    for _ in 0..10 {
        node.connect(vec![]);
    }

    assert!(node.ctx.manager.has_collateral(&handle.script));
    assert_eq!(
        node.ctx.manager.find(&handle.outpoint).unwrap().state,
        MasternodeState::Enabled
    );

    // the collateral is spent on-chain
    let spend = spend_tx(&node, &handle);
    node.connect(vec![spend]);

    assert!(!node.ctx.manager.has_collateral(&handle.script));
    assert_eq!(
        node.ctx.manager.find(&handle.outpoint).unwrap().state,
        MasternodeState::VinSpent
    );

    // the spending block is disconnected again
    node.disconnect_tip();

    assert!(node.ctx.manager.has_collateral(&handle.script));
    assert!(node
        .ctx
        .manager
        .get_collateral(&handle.script)
        .is_some_and(|coin| coin.script_pubkey() == &handle.script));
    assert_eq!(
        node.ctx.manager.find(&handle.outpoint).unwrap().state,
        MasternodeState::Enabled
    );
}

#[test]
fn connect_disconnect_is_identity_on_the_indices() {
    let mut node = TestNode::with_chain(2_050);
    let paid = node.fund_collateral();
    let victim = node.fund_collateral();
    node.register_mature(&paid);
    node.register_mature(&victim);
    for _ in 0..10 {
        node.connect(vec![]);
    }
    node.connect_paying(&paid.script);

    let prev = node.host.tip().unwrap();
    let count_before = node.ctx.manager.collateral_count();
    let engine = node.ctx.engine.lock().unwrap();
    let payment_at = |h| engine.masternode_payment(h);
    let paid_depth_before =
        node.ctx
            .manager
            .blocks_since_payment(&paid.script, &prev, &node.host, &payment_at);
    drop(engine);

    // one block that both spends a collateral and pays a masternode
    let spend = spend_tx(&node, &victim);
    let height = node.host.height() + 1;
    let amount = node.ctx.masternode_payment(height);
    let coinbase = Transaction::new(
        vec![],
        vec![
            TxOut::new(1, common::unique_script(height)),
            TxOut::new(amount, paid.script.clone()),
        ],
    );
    let block = ember_core::Block::new(
        node.host.best_hash(),
        common::block_time(height),
        vec![coinbase, spend],
    );
    node.connect_raw(block);

    assert_eq!(node.ctx.manager.collateral_count(), count_before - 1);
    assert!(!node.ctx.manager.has_collateral(&victim.script));

    node.disconnect_tip();

    // everything is exactly as before
    assert_eq!(node.ctx.manager.collateral_count(), count_before);
    assert!(node.ctx.manager.has_collateral(&victim.script));
    assert!(node.ctx.manager.has_collateral(&paid.script));

    let prev = node.host.tip().unwrap();
    let engine = node.ctx.engine.lock().unwrap();
    let payment_at = |h| engine.masternode_payment(h);
    assert_eq!(
        node.ctx
            .manager
            .blocks_since_payment(&paid.script, &prev, &node.host, &payment_at),
        paid_depth_before
    );
}

#[test]
fn off_chain_tip_uses_the_slow_payment_walk() {
    let mut node = TestNode::with_chain(2_050);
    let handle = node.fund_collateral();
    node.register_mature(&handle);
    for _ in 0..10 {
        node.connect(vec![]);
    }
    let paying_index = node.connect_paying(&handle.script);

    // disconnect it: the index is now off the active chain, but the block
    // body remains readable
    node.disconnect_tip();

    let engine = node.ctx.engine.lock().unwrap();
    let payment_at = |h| engine.masternode_payment(h);
    let depth = node.ctx.manager.blocks_since_payment(
        &handle.script,
        &paying_index,
        &node.host,
        &payment_at,
    );
    // from the viewpoint of the stale tip, the payment is right there
    assert_eq!(depth, 0);
}

#[test]
fn tampered_cache_is_rejected_and_recreated() {
    let dir = tempfile::tempdir().unwrap();
    let host = ChainState::new();

    // first session: two masternodes dumped at shutdown
    {
        let mut seeder = TestNode::with_chain(2_050);
        let handles = seeder.fund_collaterals(2);

        let ctx = MasternodeContext::new(dir.path(), NetworkParams::regtest());
        assert_eq!(ctx.startup(&host, false, NOW), ReadResult::FileError);
        for handle in &handles {
            let announce = seeder.announce_for(handle, NOW - 100);
            let mn = ember_masternode::Masternode::from_announce(&announce);
            assert!(ctx.manager.add(mn));
        }
        ctx.shutdown();
    }

    // clean restart sees both entries
    {
        let ctx = MasternodeContext::new(dir.path(), NetworkParams::regtest());
        assert!(matches!(ctx.startup(&host, false, NOW), ReadResult::Ok(_)));
        assert_eq!(ctx.manager.size(), 2);
        ctx.shutdown();
    }

    // tamper with the trailing hash
    let path = dir.path().join("mncache.dat");
    let mut data = std::fs::read(&path).unwrap();
    let last = data.len() - 1;
    data[last] ^= 0xff;
    std::fs::write(&path, data).unwrap();

    // the load fails closed and the registry starts empty;
    // shutdown rewrites a clean file
    {
        let ctx = MasternodeContext::new(dir.path(), NetworkParams::regtest());
        assert_eq!(ctx.startup(&host, false, NOW), ReadResult::IncorrectHash);
        assert_eq!(ctx.manager.size(), 0);
        ctx.shutdown();
    }

    {
        let ctx = MasternodeContext::new(dir.path(), NetworkParams::regtest());
        assert!(matches!(ctx.startup(&host, false, NOW), ReadResult::Ok(_)));
        assert_eq!(ctx.manager.size(), 0);
        ctx.shutdown();
    }
}
