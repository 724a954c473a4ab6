//! Non-negative currency amounts.
//!
//! Kept as a thin newtype over `u64` rather than a bare integer so that
//! overflow/underflow in balance arithmetic is forced through
//! `checked_add`/`checked_sub` at every call site instead of silently
//! wrapping, matching the teacher's habit of wrapping primitives (`Hash`,
//! `UtxoKey`) in named types rather than passing raw integers around.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};

use crate::constants::DECIMAL_SCALE_FACTOR;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Amount(pub u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Renders the amount as a human-readable decimal string using the
    /// system-wide scale factor. Never used on a consensus path.
    pub fn to_decimal_string(self) -> String {
        let whole = self.0 / DECIMAL_SCALE_FACTOR;
        let frac = self.0 % DECIMAL_SCALE_FACTOR;
        format!("{whole}.{frac:04}")
    }
}

impl Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Amount {
        Amount(self.0 + rhs.0)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, Add::add)
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({})", self.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_sub_detects_underflow() {
        assert_eq!(Amount(5).checked_sub(Amount(10)), None);
        assert_eq!(Amount(10).checked_sub(Amount(5)), Some(Amount(5)));
    }

    #[test]
    fn decimal_string_uses_scale_factor() {
        assert_eq!(Amount(10_000).to_decimal_string(), "1.0000");
        assert_eq!(Amount(15_000).to_decimal_string(), "1.5000");
    }
}
