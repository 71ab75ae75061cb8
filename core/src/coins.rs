//! Live UTXO set view

use crate::constants::{Amount, Height};
use crate::script::Script;
use crate::transaction::{OutPoint, TxOut};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An unspent output together with its creation metadata
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default, Debug)]
pub struct Coin {
    pub out: TxOut,
    pub height: Height,
    pub is_coinbase: bool,
    pub is_coinstake: bool,
}

impl Coin {
    pub fn new(out: TxOut, height: Height, is_coinbase: bool, is_coinstake: bool) -> Self {
        Coin {
            out,
            height,
            is_coinbase,
            is_coinstake,
        }
    }

    pub fn value(&self) -> Amount {
        self.out.value
    }

    pub fn script_pubkey(&self) -> &Script {
        &self.out.script_pubkey
    }
}

/// In-memory view over the live UTXO set
#[derive(Default)]
pub struct CoinsView {
    coins: HashMap<OutPoint, Coin>,
}

impl CoinsView {
    pub fn new() -> Self {
        CoinsView::default()
    }

    pub fn add_coin(&mut self, outpoint: OutPoint, coin: Coin) {
        self.coins.insert(outpoint, coin);
    }

    pub fn spend_coin(&mut self, outpoint: &OutPoint) -> Option<Coin> {
        self.coins.remove(outpoint)
    }

    pub fn coin(&self, outpoint: &OutPoint) -> Option<&Coin> {
        self.coins.get(outpoint)
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }

    /// Restartable iteration over every live coin
    pub fn cursor(&self) -> impl Iterator<Item = (&OutPoint, &Coin)> {
        self.coins.iter()
    }

    /// Number of confirmations the outpoint has at the given height,
    /// or 0 when the coin is unknown
    pub fn coin_depth_at_height(&self, outpoint: &OutPoint, height: Height) -> Height {
        match self.coins.get(outpoint) {
            Some(coin) if height >= coin.height => height - coin.height + 1,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::Hash256;

    fn outpoint(seed: u8) -> OutPoint {
        OutPoint::new(Hash256::double_sha256(&[seed]), 0)
    }

    #[test]
    fn test_depth_counts_inclusive_confirmations() {
        let mut view = CoinsView::new();
        let op = outpoint(1);
        view.add_coin(op, Coin::new(TxOut::default(), 100, false, false));

        assert_eq!(view.coin_depth_at_height(&op, 100), 1);
        assert_eq!(view.coin_depth_at_height(&op, 114), 15);
        assert_eq!(view.coin_depth_at_height(&op, 99), 0);
        assert_eq!(view.coin_depth_at_height(&outpoint(2), 100), 0);
    }

    #[test]
    fn test_spend_removes_from_cursor() {
        let mut view = CoinsView::new();
        let op = outpoint(1);
        view.add_coin(op, Coin::new(TxOut::default(), 1, false, false));
        assert_eq!(view.cursor().count(), 1);
        assert!(view.spend_coin(&op).is_some());
        assert_eq!(view.cursor().count(), 0);
    }
}
