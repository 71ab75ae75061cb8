//! Chain-wide constants and semantic type aliases

/// Monetary amount in the smallest currency unit
pub type Amount = i64;

/// Block height index
pub type Height = i64;

/// Smallest-unit value of one whole coin
pub const COIN: Amount = 100_000_000;

pub const MINUTE_IN_SECONDS: i64 = 60;
pub const HOUR_IN_SECONDS: i64 = 60 * MINUTE_IN_SECONDS;
pub const DAY_IN_SECONDS: i64 = 24 * HOUR_IN_SECONDS;
pub const WEEK_IN_SECONDS: i64 = 7 * DAY_IN_SECONDS;
pub const MONTH_IN_SECONDS: i64 = 30 * DAY_IN_SECONDS;
