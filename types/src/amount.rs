//! Fixed-point monetary amounts.
//!
//! Amounts are signed 128-bit integers scaled by 10^18 to give exact
//! decimal semantics without floating point. All ledger arithmetic goes
//! through the checked operations — an overflow is a fatal validation
//! error, never a silent wrap or saturation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Number of decimal places in the fixed-point representation.
pub const DECIMALS: u32 = 18;

const SCALE: i128 = 10i128.pow(DECIMALS);

/// A signed fixed-point amount (value × 10^18 raw units).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Amount(i128);

impl Amount {
    pub const ZERO: Self = Self(0);

    /// Construct from raw (already scaled) units.
    pub fn from_raw(raw: i128) -> Self {
        Self(raw)
    }

    /// Construct from a whole number of tokens.
    pub fn from_integral(value: i64) -> Self {
        Self(value as i128 * SCALE)
    }

    pub fn raw(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl Add for Amount {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Amount {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / SCALE as u128;
        let frac = abs % SCALE as u128;
        if frac == 0 {
            write!(f, "{sign}{whole}")
        } else {
            let s = format!("{frac:018}");
            write!(f, "{sign}{whole}.{}", s.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_construction() {
        let a = Amount::from_integral(5);
        assert_eq!(a.raw(), 5 * SCALE);
        assert_eq!(a.to_string(), "5");
    }

    #[test]
    fn checked_add_overflow_is_none() {
        let a = Amount::from_raw(i128::MAX);
        assert!(a.checked_add(Amount::from_raw(1)).is_none());
    }

    #[test]
    fn checked_sub_underflow_is_none() {
        let a = Amount::from_raw(i128::MIN);
        assert!(a.checked_sub(Amount::from_raw(1)).is_none());
    }

    #[test]
    fn negative_amounts_order_below_zero() {
        let neg = Amount::from_integral(-1);
        assert!(neg < Amount::ZERO);
        assert!(neg.is_negative());
        assert_eq!(neg.to_string(), "-1");
    }

    #[test]
    fn fractional_display_trims_zeros() {
        let a = Amount::from_raw(SCALE + SCALE / 2);
        assert_eq!(a.to_string(), "1.5");
    }
}
