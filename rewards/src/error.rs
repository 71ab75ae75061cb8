//! Rewards error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewardsError {
    #[error("Database error: {0}")]
    Database(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database unavailable after {0} open attempts")]
    OpenExhausted(u32),

    #[error("Missing chain data: {0}")]
    MissingChainData(String),
}

pub type Result<T> = std::result::Result<T, RewardsError>;
