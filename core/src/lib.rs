//! Ember Core - chain primitives and host-node contracts

pub mod block;
pub mod chain;
pub mod coins;
pub mod constants;
pub mod hash;
pub mod params;
pub mod script;
pub mod state;
pub mod transaction;

pub use block::{Block, BlockHeader};
pub use chain::{BlockIndex, BlockStore, Chain, TxIndex};
pub use coins::{Coin, CoinsView};
pub use constants::*;
pub use hash::Hash256;
pub use params::{DosScores, Network, NetworkParams};
pub use script::Script;
pub use state::ChainState;
pub use transaction::{OutPoint, Transaction, TxIn, TxOut};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
