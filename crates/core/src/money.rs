use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, Sub, SubAssign};

/// A monetary amount held at two decimal places.
///
/// Arithmetic keeps full `Decimal` precision; call [`Money::round`] or
/// [`Money::floor`] when a displayable amount is needed. Operators saturate at
/// the `Decimal` range instead of panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);
    pub const ONE: Money = Money(Decimal::ONE);

    pub const fn from_cents(cents: i64) -> Self {
        let negative = cents < 0;
        let magnitude = cents.unsigned_abs();
        Money(Decimal::from_parts(magnitude as u32, (magnitude >> 32) as u32, 0, negative, 2))
    }

    pub fn from_major(units: i64) -> Self {
        Money(Decimal::from(units))
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal)
    }

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn to_cents(self) -> i64 {
        let cents = self.round().0.saturating_mul(Decimal::ONE_HUNDRED);
        cents.to_i64().unwrap_or(if cents.is_sign_negative() { i64::MIN } else { i64::MAX })
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// Half-away-from-zero rounding to two decimals.
    pub fn round(self) -> Self {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Truncation toward negative infinity at two decimals.
    pub fn floor(self) -> Self {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<Decimal> for Money {
    type Output = Self;
    fn mul(self, rhs: Decimal) -> Self {
        Money(self.0.saturating_mul(rhs))
    }
}

/// Division by zero yields zero; callers guard member counts before dividing.
impl Div<Decimal> for Money {
    type Output = Self;
    fn div(self, rhs: Decimal) -> Self {
        match self.0.checked_div(rhs) {
            Some(quotient) => Money(quotient),
            None if rhs.is_zero() => Money::ZERO,
            None if self.0.is_sign_negative() != rhs.is_sign_negative() => Money(Decimal::MIN),
            None => Money(Decimal::MAX),
        }
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |a, b| a + b)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.fold(Money::ZERO, |a, b| a + *b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cents_roundtrip() {
        assert_eq!(Money::from_cents(12345).to_cents(), 12345);
        assert_eq!(Money::from_major(25_000).to_cents(), 2_500_000);
    }

    #[test]
    fn floor_and_round_differ_on_thirds() {
        let third = Money::from_major(100_000) / Decimal::from(3);
        assert_eq!(third.floor(), Money::from_cents(3_333_333));
        assert_eq!(third.round(), Money::from_cents(3_333_333));
        let two_thirds = Money::from_major(200_000) / Decimal::from(3);
        assert_eq!(two_thirds.floor(), Money::from_cents(6_666_666));
        assert_eq!(two_thirds.round(), Money::from_cents(6_666_667));
    }

    #[test]
    fn divide_by_zero_is_zero() {
        assert_eq!(Money::from_major(10) / Decimal::ZERO, Money::ZERO);
    }

    #[test]
    fn arithmetic_saturates_instead_of_panicking() {
        let huge = Money::from_decimal(Decimal::MAX);
        assert_eq!(huge + Money::ONE, huge);
        assert_eq!(huge * Decimal::from(2), huge);
        assert_eq!(Money::from_decimal(Decimal::MIN) - Money::ONE, Money::from_decimal(Decimal::MIN));
        assert_eq!(huge / Decimal::new(1, 10), huge);
        assert_eq!(Money::from_decimal(Decimal::MIN).to_cents(), i64::MIN);
        assert_eq!(huge.to_cents(), i64::MAX);

        let mut running = huge;
        running += huge;
        assert_eq!(running, huge);
    }

    #[test]
    fn display_two_decimals() {
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_major(27_500).to_string(), "27500.00");
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [Money::from_cents(150), Money::from_cents(250)].iter().sum();
        assert_eq!(total, Money::from_cents(400));
    }
}
