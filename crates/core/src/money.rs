//! Exact fixed-point monetary amounts.
//!
//! Every monetary field in the domain goes through [`Money`], which wraps
//! `rust_decimal::Decimal`. Floating point is never used for money.

use core::iter::Sum;
use core::ops::{Add, AddAssign, Sub, SubAssign};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// A monetary amount with exact decimal precision.
///
/// Currency handling is out of scope for this core: all amounts within one
/// tenant are assumed to share a single currency, and no conversion is
/// performed.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    pub fn abs(&self) -> Money {
        Money(self.0.abs())
    }

    pub fn min(self, other: Money) -> Money {
        Money(self.0.min(other.0))
    }
}

impl ValueObject for Money {}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn arithmetic_is_exact() {
        let a = Money::new(dec!(0.10));
        let b = Money::new(dec!(0.20));
        assert_eq!(a + b, Money::new(dec!(0.30)));
        assert_eq!((a + b) - b, a);
    }

    #[test]
    fn comparisons_ignore_trailing_zeros() {
        assert_eq!(Money::new(dec!(1.00)), Money::new(dec!(1)));
        assert!(Money::new(dec!(1.01)) > Money::new(dec!(1.0)));
    }

    #[test]
    fn min_and_sum() {
        let amounts = [dec!(100), dec!(250.50), dec!(0.25)].map(Money::new);
        assert_eq!(amounts[0].min(amounts[2]), amounts[2]);
        assert_eq!(
            amounts.into_iter().sum::<Money>(),
            Money::new(dec!(350.75))
        );
    }

    #[test]
    fn sign_helpers() {
        assert!(Money::new(dec!(5)).is_positive());
        assert!(Money::new(dec!(-5)).is_negative());
        assert!(Money::ZERO.is_zero());
        assert!(!Money::ZERO.is_positive());
    }
}
