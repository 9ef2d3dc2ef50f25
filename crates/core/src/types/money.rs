//! Type-safe money using decimal arithmetic.
//!
//! All catalog prices are in rupees with two decimal places. The payment
//! gateway expects integer paise, see [`Money::to_minor_units`].

use core::fmt;
use core::ops::Add;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors raised by money arithmetic and validation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("amount cannot be negative")]
    Negative,
    #[error("discount must be between 0 and 100 percent (got {0})")]
    InvalidDiscount(i32),
    #[error("amount is too large to convert to minor units")]
    Overflow,
}

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    INR,
}

impl Currency {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::INR => "INR",
        }
    }

    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::INR => "₹",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A monetary amount in a currency's standard unit (rupees, not paise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Currency,
}

impl Money {
    /// Create an amount in rupees, rounded to paise.
    #[must_use]
    pub fn inr(amount: Decimal) -> Self {
        Self {
            amount: round_paise(amount),
            currency: Currency::INR,
        }
    }

    /// Zero rupees.
    #[must_use]
    pub const fn zero() -> Self {
        Self {
            amount: Decimal::ZERO,
            currency: Currency::INR,
        }
    }

    /// Create an amount from integer paise.
    #[must_use]
    pub fn from_minor_units(paise: i64) -> Self {
        Self {
            amount: Decimal::new(paise, 2),
            currency: Currency::INR,
        }
    }

    /// Validate that a catalog price is not negative.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for amounts below zero.
    pub fn non_negative(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        Ok(Self::inr(amount))
    }

    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Multiply a unit price by a line quantity.
    #[must_use]
    pub fn times(self, quantity: u32) -> Self {
        Self {
            amount: round_paise(self.amount * Decimal::from(quantity)),
            currency: self.currency,
        }
    }

    /// Apply a percentage discount (0..=100), rounding half-up to paise.
    ///
    /// The result is never above the original price and never negative.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidDiscount`] if `percent` is out of range.
    pub fn discounted(self, percent: i32) -> Result<Self, MoneyError> {
        validate_discount(percent)?;
        let keep = Decimal::from(100 - percent);
        let amount = round_paise(self.amount * keep / Decimal::ONE_HUNDRED);
        Ok(Self {
            amount: amount.min(self.amount).max(Decimal::ZERO),
            currency: self.currency,
        })
    }

    /// Difference `self - other`, floored at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self {
            amount: (self.amount - other.amount).max(Decimal::ZERO),
            currency: self.currency,
        }
    }

    /// Convert to integer minor units (paise) for the payment gateway.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the amount does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        (self.amount * Decimal::ONE_HUNDRED)
            .round()
            .to_i64()
            .ok_or(MoneyError::Overflow)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            amount: self.amount + rhs.amount,
            currency: self.currency,
        }
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:.2}", self.currency.symbol(), self.amount)
    }
}

/// Check a discount percentage is within `0..=100`.
///
/// # Errors
///
/// Returns [`MoneyError::InvalidDiscount`] if it is not.
pub const fn validate_discount(percent: i32) -> Result<(), MoneyError> {
    if percent < 0 || percent > 100 {
        return Err(MoneyError::InvalidDiscount(percent));
    }
    Ok(())
}

fn round_paise(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rupees(s: &str) -> Money {
        Money::inr(s.parse().unwrap())
    }

    #[test]
    fn test_discount_rounds_half_up() {
        // 10% off 149.95 = 134.955 -> 134.96
        assert_eq!(rupees("149.95").discounted(10).unwrap(), rupees("134.96"));
    }

    #[test]
    fn test_discount_bounds() {
        let price = rupees("200");
        assert_eq!(price.discounted(0).unwrap(), price);
        assert_eq!(price.discounted(100).unwrap(), Money::zero());
        assert_eq!(price.discounted(-1), Err(MoneyError::InvalidDiscount(-1)));
        assert_eq!(price.discounted(101), Err(MoneyError::InvalidDiscount(101)));
    }

    #[test]
    fn test_discounted_never_exceeds_list() {
        for pct in 0..=100 {
            let list = rupees("0.01");
            assert!(list.discounted(pct).unwrap() <= list);
        }
    }

    #[test]
    fn test_times_and_sum() {
        let total: Money = [rupees("10.50").times(3), rupees("0.25").times(4)]
            .into_iter()
            .sum();
        assert_eq!(total, rupees("32.50"));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(rupees("499.00").to_minor_units().unwrap(), 49_900);
        assert_eq!(rupees("0.05").to_minor_units().unwrap(), 5);
        assert_eq!(Money::from_minor_units(12_345), rupees("123.45"));
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(
            Money::non_negative("-1".parse().unwrap()),
            Err(MoneyError::Negative)
        );
        assert!(Money::non_negative(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_saturating_sub() {
        assert_eq!(rupees("5").saturating_sub(rupees("7")), Money::zero());
        assert_eq!(rupees("7").saturating_sub(rupees("5")), rupees("2"));
    }

    #[test]
    fn test_display() {
        assert_eq!(rupees("49.5").to_string(), "₹49.50");
    }
}
