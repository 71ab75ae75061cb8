//! Block structure

use crate::constants::Amount;
use crate::hash::Hash256;
use crate::script::Script;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default, Debug)]
pub struct BlockHeader {
    pub prev_hash: Hash256,
    pub time: i64,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default, Debug)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(prev_hash: Hash256, time: i64, transactions: Vec<Transaction>) -> Self {
        Block {
            header: BlockHeader { prev_hash, time },
            transactions,
        }
    }

    /// Content hash identifying this block
    pub fn hash(&self) -> Hash256 {
        let bytes = bincode::serialize(self).expect("block serialization is infallible");
        Hash256::double_sha256(&bytes)
    }

    /// Proof-of-stake blocks carry a coinstake as their second transaction
    pub fn is_proof_of_stake(&self) -> bool {
        self.transactions.len() > 1 && self.transactions[1].is_coinstake()
    }

    pub fn is_proof_of_work(&self) -> bool {
        !self.is_proof_of_stake()
    }

    /// The coinbase or coinstake transaction carrying the block reward
    pub fn reward_transaction(&self) -> Option<&Transaction> {
        let idx = if self.is_proof_of_stake() { 1 } else { 0 };
        self.transactions.get(idx)
    }

    /// Script of the output paid exactly `amount` in the reward transaction,
    /// if any. This is how the masternode payee of a connected block is read
    /// back out of it.
    pub fn paid_payee(&self, amount: Amount) -> Option<Script> {
        if amount <= 0 {
            return None;
        }
        let tx = self.reward_transaction()?;
        let mut payee = None;
        for out in &tx.outputs {
            if out.value == amount {
                payee = Some(out.script_pubkey.clone());
            }
        }
        payee
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{OutPoint, TxIn, TxOut};

    fn coinstake(outputs: Vec<TxOut>) -> Transaction {
        let mut outs = vec![TxOut::default()];
        outs.extend(outputs);
        Transaction::new(vec![TxIn::new(OutPoint::default())], outs)
    }

    #[test]
    fn test_proof_of_stake_detection() {
        let coinbase = Transaction::new(vec![], vec![TxOut::default()]);
        let block = Block::new(
            Hash256::ZERO,
            1000,
            vec![coinbase, coinstake(vec![TxOut::new(10, Script::new(vec![1]))])],
        );
        assert!(block.is_proof_of_stake());
        assert!(!block.is_proof_of_work());
    }

    #[test]
    fn test_paid_payee_finds_exact_amount() {
        let payee = Script::new(vec![0xaa; 25]);
        let coinbase = Transaction::new(
            vec![],
            vec![
                TxOut::new(500, Script::new(vec![1])),
                TxOut::new(65, payee.clone()),
            ],
        );
        let block = Block::new(Hash256::ZERO, 1000, vec![coinbase]);
        assert_eq!(block.paid_payee(65), Some(payee));
        assert_eq!(block.paid_payee(66), None);
        assert_eq!(block.paid_payee(0), None);
    }
}
