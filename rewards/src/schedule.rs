//! Piecewise-constant reward and collateral schedules
//!
//! Amounts step across coarse 100 000-block bands. All functions are pure.

use ember_core::{Amount, Height, COIN};

/// Height below which no masternode payment is made
pub const MASTERNODE_PAYMENT_START: Height = 2_000;

/// Masternode share of the block value, in percent
pub const MASTERNODE_SHARE_PCT: Amount = 65;

/// Last height of the initial swap emission window
const SWAP_EMISSION_END: Height = 15;
const SWAP_EMISSION: Amount = 13_000_000 * COIN;

/// (first height, amount) bands; amounts hold until the next band starts
const COLLATERAL_BANDS: &[(Height, Amount)] = &[
    (1, 1_500 * COIN),
    (100_001, 2_000 * COIN),
    (300_001, 2_500 * COIN),
    (500_001, 3_000 * COIN),
    (700_001, 4_000 * COIN),
    (900_001, 5_000 * COIN),
    (1_000_001, 6_000 * COIN),
    (1_200_001, 7_000 * COIN),
    (1_300_001, 8_000 * COIN),
    (1_500_001, 9_000 * COIN),
    (1_600_001, 10_000 * COIN),
    (1_800_001, 12_000 * COIN),
    (1_900_001, 14_000 * COIN),
    (2_100_001, 16_000 * COIN),
    (2_300_001, 18_000 * COIN),
    (2_400_001, 20_000 * COIN),
    (2_700_001, 25_000 * COIN),
    (2_900_001, 30_000 * COIN),
    (3_100_001, 35_000 * COIN),
    (3_200_001, 40_000 * COIN),
];

const SUBSIDY_BANDS: &[(Height, Amount)] = &[
    (1, 45 * COIN),
    (100_001, 40 * COIN),
    (500_001, 35 * COIN),
    (800_001, 30 * COIN),
    (1_000_001, 25 * COIN),
    (1_300_001, 20 * COIN),
    (1_600_001, 15 * COIN),
    (2_000_001, 10 * COIN),
    (2_300_001, 8 * COIN),
    (2_600_001, 6 * COIN),
    (2_900_001, 4 * COIN),
    (3_300_001, 3 * COIN),
    (3_600_001, 2 * COIN),
];

fn band_amount(bands: &[(Height, Amount)], height: Height) -> Amount {
    for &(start, value) in bands.iter().rev() {
        if height >= start {
            return value;
        }
    }
    // below the first band the historical schedule falls through
    // to the final amount
    bands[bands.len() - 1].1
}

/// Masternode collateral required at the given height
pub fn collateral(height: Height) -> Amount {
    band_amount(COLLATERAL_BANDS, height)
}

/// Base block subsidy at the given height, before dynamic adjustment
pub fn base_subsidy(height: Height) -> Amount {
    if height <= SWAP_EMISSION_END {
        return SWAP_EMISSION;
    }
    band_amount(SUBSIDY_BANDS, height)
}

/// Scheduled masternode payment, from the base subsidy alone
pub fn masternode_payment(height: Height) -> Amount {
    if height < MASTERNODE_PAYMENT_START {
        return 0;
    }
    base_subsidy(height) * MASTERNODE_SHARE_PCT / 100
}

/// Whether the amount equals the collateral of any schedule band
pub fn is_collateral_amount(amount: Amount) -> bool {
    COLLATERAL_BANDS.iter().any(|&(_, value)| value == amount)
}

/// Blocks until the collateral amount next changes, with the new amount.
/// `None` once the final band is reached.
pub fn next_collateral_change(height: Height) -> Option<(Height, Amount)> {
    for &(start, value) in COLLATERAL_BANDS {
        if start > height {
            return Some((start - height, value));
        }
    }
    None
}
