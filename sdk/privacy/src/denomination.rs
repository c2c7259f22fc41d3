//! Fixed Deposit Denominations
//!
//! Every pool deposit is one of a small public set of amounts, so deposits
//! of the same bucket are indistinguishable on-chain. Amounts are in base
//! units of an 18-decimal token.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PrivacyError, Result};

/// 10^18 base units
pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Most deposits a single split may produce
pub const MAX_SPLIT_DEPOSITS: u128 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denomination {
    /// 0.1 token
    Tenth,
    /// 1 token
    One,
    /// 10 tokens
    Ten,
    /// 100 tokens
    Hundred,
}

impl Denomination {
    /// Ascending by value
    pub const ALL: [Denomination; 4] = [
        Denomination::Tenth,
        Denomination::One,
        Denomination::Ten,
        Denomination::Hundred,
    ];

    pub const fn value(self) -> u128 {
        match self {
            Denomination::Tenth => ONE_TOKEN / 10,
            Denomination::One => ONE_TOKEN,
            Denomination::Ten => ONE_TOKEN * 10,
            Denomination::Hundred => ONE_TOKEN * 100,
        }
    }

    /// Stable on-chain index
    pub const fn index(self) -> u8 {
        match self {
            Denomination::Tenth => 0,
            Denomination::One => 1,
            Denomination::Ten => 2,
            Denomination::Hundred => 3,
        }
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Denomination::Tenth => "0.1",
            Denomination::One => "1",
            Denomination::Ten => "10",
            Denomination::Hundred => "100",
        };
        write!(f, "{label}")
    }
}

/// Map an exact amount onto its denomination
pub fn value_to_fixed_denomination(amount: u128) -> Result<Denomination> {
    Denomination::ALL
        .into_iter()
        .find(|d| d.value() == amount)
        .ok_or(PrivacyError::UnsupportedDenomination(amount))
}

pub fn fixed_denomination_to_value(denomination: Denomination) -> u128 {
    denomination.value()
}

/// Greedy decomposition into fixed deposits, largest first.
///
/// Fails unless the amount is an exact multiple of the smallest bucket and
/// needs at most [`MAX_SPLIT_DEPOSITS`] deposits.
pub fn split_into_denominations(amount: u128) -> Result<Vec<Denomination>> {
    if amount == 0 || amount % Denomination::Tenth.value() != 0 {
        return Err(PrivacyError::UnsupportedDenomination(amount));
    }

    let mut remaining = amount;
    let mut counts = Vec::with_capacity(Denomination::ALL.len());
    for denomination in Denomination::ALL.into_iter().rev() {
        let count = remaining / denomination.value();
        remaining -= count * denomination.value();
        counts.push((denomination, count));
    }

    let total: u128 = counts.iter().map(|(_, count)| count).sum();
    if total > MAX_SPLIT_DEPOSITS {
        return Err(PrivacyError::TooManyDeposits {
            amount,
            max: MAX_SPLIT_DEPOSITS,
        });
    }

    Ok(counts
        .into_iter()
        .flat_map(|(denomination, count)| std::iter::repeat_n(denomination, count as usize))
        .collect())
}
