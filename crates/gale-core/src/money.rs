//! Precision-safe money amounts.
//!
//! Stakes, balances and PnL all flow through `Money` so that cent rounding
//! happens in exactly one place and floats never enter the trade path.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use std::str::FromStr;

/// Amount of account currency with exact decimal precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round to cents using banker's rounding.
    #[inline]
    pub fn round_cents(&self) -> Self {
        Self(self.0.round_dp(2))
    }

    /// Multiply by an integral factor (martingale stage multiplier).
    #[inline]
    pub fn scaled(&self, factor: u32) -> Self {
        Self(self.0 * Decimal::from(factor))
    }

    /// Clamp to `max`. A non-positive cap disables clamping.
    #[inline]
    pub fn capped(&self, max: Money) -> Self {
        if max.is_positive() && self.0 > max.0 {
            max
        } else {
            *self
        }
    }

    #[inline]
    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;

    fn mul(self, rhs: Decimal) -> Self::Output {
        Self(self.0 * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_round_cents() {
        assert_eq!(Money(dec!(8.504)).round_cents(), Money(dec!(8.50)));
        assert_eq!(Money(dec!(8.506)).round_cents(), Money(dec!(8.51)));
        // banker's rounding on the midpoint
        assert_eq!(Money(dec!(0.125)).round_cents(), Money(dec!(0.12)));
    }

    #[test]
    fn test_scaled_and_capped() {
        let base = Money(dec!(300));
        assert_eq!(base.scaled(2), Money(dec!(600)));
        assert_eq!(base.scaled(4).capped(Money(dec!(1000))), Money(dec!(1000)));
        assert_eq!(base.scaled(4).capped(Money::ZERO), Money(dec!(1200)));
    }

    #[test]
    fn test_sign_helpers() {
        assert!(Money(dec!(0.01)).is_positive());
        assert!(!Money::ZERO.is_positive());
        assert!(!Money(dec!(-3)).is_positive());
        assert_eq!(-Money(dec!(10)), Money(dec!(-10)));
    }

    #[test]
    fn test_parse() {
        let m: Money = " 12.34 ".parse().unwrap();
        assert_eq!(m, Money(dec!(12.34)));
        assert!("abc".parse::<Money>().is_err());
    }
}
