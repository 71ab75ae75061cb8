//! Ember Rewards - block subsidy schedule and dynamic reward engine

pub mod engine;
pub mod error;
pub mod schedule;

pub use engine::RewardEngine;
pub use error::{Result, RewardsError};
