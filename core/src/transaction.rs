//! UTXO-model transactions

use crate::constants::Amount;
use crate::hash::Hash256;
use crate::script::Script;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a specific transaction output
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default, Debug)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        OutPoint { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let txid = self.txid.to_string();
        write!(f, "{}:{}", &txid[..16.min(txid.len())], self.vout)
    }
}

/// Transaction input
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default, Debug)]
pub struct TxIn {
    pub prevout: OutPoint,
    pub script_sig: Vec<u8>,
}

impl TxIn {
    pub fn new(prevout: OutPoint) -> Self {
        TxIn {
            prevout,
            script_sig: Vec::new(),
        }
    }
}

/// Transaction output
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default, Debug)]
pub struct TxOut {
    pub value: Amount,
    pub script_pubkey: Script,
}

impl TxOut {
    pub fn new(value: Amount, script_pubkey: Script) -> Self {
        TxOut {
            value,
            script_pubkey,
        }
    }

    /// The empty marker output that leads a coinstake transaction
    pub fn is_empty_marker(&self) -> bool {
        self.value == 0 && self.script_pubkey.is_empty()
    }
}

/// A transaction: inputs spending prior outputs, outputs creating new coins
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default, Debug)]
pub struct Transaction {
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
}

impl Transaction {
    pub fn new(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Self {
        Transaction { inputs, outputs }
    }

    /// Content hash identifying this transaction
    pub fn txid(&self) -> Hash256 {
        let bytes = bincode::serialize(self).expect("transaction serialization is infallible");
        Hash256::double_sha256(&bytes)
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.is_empty()
    }

    /// A coinstake carries at least one input and leads with an empty output
    pub fn is_coinstake(&self) -> bool {
        !self.inputs.is_empty() && !self.outputs.is_empty() && self.outputs[0].is_empty_marker()
    }

    /// Sum of all output values
    pub fn value_out(&self) -> Amount {
        self.outputs.iter().map(|out| out.value).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_txid_changes_with_content() {
        let a = Transaction::new(vec![], vec![TxOut::new(5, Script::default())]);
        let b = Transaction::new(vec![], vec![TxOut::new(6, Script::default())]);
        assert_ne!(a.txid(), b.txid());
    }

    #[test]
    fn test_coinstake_detection() {
        let stake = Transaction::new(
            vec![TxIn::new(OutPoint::default())],
            vec![
                TxOut::default(),
                TxOut::new(100, Script::new(vec![1, 2, 3])),
            ],
        );
        assert!(stake.is_coinstake());
        assert!(!stake.is_coinbase());

        let coinbase = Transaction::new(vec![], vec![TxOut::new(100, Script::new(vec![1]))]);
        assert!(coinbase.is_coinbase());
        assert!(!coinbase.is_coinstake());
    }
}
