//! Amounts

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Amount in thousandths of a satoshi, the unit every HTLC is denominated in
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MilliSatoshi(u64);

impl MilliSatoshi {
    /// Zero amount
    pub const ZERO: MilliSatoshi = MilliSatoshi(0);

    /// Amount from whole satoshis
    pub const fn from_sat(sat: u64) -> Self {
        Self(sat * 1000)
    }

    /// Whole satoshis, rounded down
    pub const fn to_sat(self) -> u64 {
        self.0 / 1000
    }

    /// Checked addition
    pub fn checked_add(self, other: MilliSatoshi) -> Option<MilliSatoshi> {
        self.0.checked_add(other.0).map(MilliSatoshi)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: MilliSatoshi) -> Option<MilliSatoshi> {
        self.0.checked_sub(other.0).map(MilliSatoshi)
    }
}

impl From<u64> for MilliSatoshi {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<MilliSatoshi> for u64 {
    fn from(value: MilliSatoshi) -> Self {
        value.0
    }
}

impl fmt::Display for MilliSatoshi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} mSAT", self.0)
    }
}

impl Add for MilliSatoshi {
    type Output = MilliSatoshi;

    fn add(self, rhs: MilliSatoshi) -> Self::Output {
        MilliSatoshi(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for MilliSatoshi {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sum for MilliSatoshi {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(MilliSatoshi::ZERO, |acc, x| acc + x)
    }
}
