//! # Money Module
//!
//! `Money` holds an amount in paise (1/100 rupee) as an `i64`.
//!
//! ## Where Integers Apply
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Costing works in f64: box quantities are fractional (12.5 boxes) and   │
//! │  a weighted average is a ratio anyway.                                  │
//! │                                                                         │
//! │  Anything that is STORED or COMPARED for idempotence is Money:          │
//! │    commission base, commission amount, return subtotal / GST / total    │
//! │                                                                         │
//! │  The crossing point is `Money::from_rupees`, which rounds half away     │
//! │  from zero to the nearest paisa exactly once.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tilemart_core::money::Money;
//! use tilemart_core::types::Percent;
//!
//! let base = Money::from_rupees(50_000.0);
//! let commission = base.percent_of(Percent::from_bps(250)); // 2.5%
//! assert_eq!(commission.paise(), 125_000);
//! assert_eq!(commission.to_string(), "₹1250.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::types::Percent;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in paise.
///
/// Signed so that differences (stored vs. computed) can be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from paise.
    #[inline]
    pub const fn from_paise(paise: i64) -> Self {
        Money(paise)
    }

    /// Rounds a rupee amount to the nearest paisa (half away from zero).
    ///
    /// Non-finite input becomes zero.
    ///
    /// ```rust
    /// use tilemart_core::money::Money;
    ///
    /// assert_eq!(Money::from_rupees(220.525).paise(), 22053);
    /// assert_eq!(Money::from_rupees(-0.005).paise(), -1);
    /// assert_eq!(Money::from_rupees(f64::NAN).paise(), 0);
    /// ```
    pub fn from_rupees(rupees: f64) -> Self {
        if !rupees.is_finite() {
            return Money::zero();
        }
        // Nudge so decimal halves (220.525) that land a hair below .5 in
        // binary still round away from zero.
        let scaled = rupees * 100.0;
        let nudged = scaled + scaled.signum() * 1e-9;
        Money(nudged.round() as i64)
    }

    /// Returns the value in paise.
    #[inline]
    pub const fn paise(&self) -> i64 {
        self.0
    }

    /// Whole-rupee part (truncated toward zero).
    #[inline]
    pub const fn rupees(&self) -> i64 {
        self.0 / 100
    }

    /// Paise part (always 0-99).
    #[inline]
    pub const fn paise_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// The amount as a floating rupee value, for mixing with cost figures.
    #[inline]
    pub fn as_rupees(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Applies a percentage, rounding half up to the paisa.
    ///
    /// ## Implementation
    /// Integer math in i128: `(paise * bps + 5000) / 10000`.
    /// Used for commission amounts and return GST, both of which are
    /// non-negative.
    pub fn percent_of(&self, rate: Percent) -> Money {
        let scaled = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money(scaled as i64)
    }

    /// Clamps negative values to zero.
    #[inline]
    pub fn floor_zero(self) -> Money {
        Money(self.0.max(0))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}₹{}.{:02}", sign, self.rupees().abs(), self.paise_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
