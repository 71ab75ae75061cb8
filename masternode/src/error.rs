//! Masternode error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MasternodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Masternode not found: {0}")]
    NotFound(String),

    #[error("Chain data unavailable: {0}")]
    MissingChainData(String),
}

pub type Result<T> = std::result::Result<T, MasternodeError>;
