//! Prices in integer minor currency units.
//!
//! Every amount crossing the remote boundary is an unsigned integer count of
//! paise. Arithmetic stays in integers and display goes through
//! [`rust_decimal`], so a stored price round-trips exactly.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Number of minor units in one major unit (100 paise = 1 rupee).
pub const MINOR_UNITS_PER_MAJOR: u64 = 100;

/// Symbol prefixed to displayed amounts.
pub const CURRENCY_SYMBOL: &str = "₹";

/// A non-negative price in minor currency units.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Price(u64);

impl Price {
    /// Zero price.
    pub const ZERO: Self = Self(0);

    /// Create a price from a count of minor units.
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// The amount in minor units.
    #[must_use]
    pub const fn minor_units(&self) -> u64 {
        self.0
    }

    /// The amount in major units as an exact decimal (e.g. 1234 -> 12.34).
    #[must_use]
    pub fn to_decimal(&self) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(self.0), 2)
    }

    /// Multiply by a quantity, returning `None` on overflow.
    #[must_use]
    pub const fn checked_mul(self, quantity: u64) -> Option<Self> {
        match self.0.checked_mul(quantity) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Add two prices, returning `None` on overflow.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Format for display with Indian digit grouping and at most two
    /// fraction digits (e.g. 123456789 -> "₹12,34,567.89", 1200 -> "₹12").
    #[must_use]
    pub fn display(&self) -> String {
        let major = self.to_decimal().normalize().to_string();
        let (whole, fraction) = match major.split_once('.') {
            Some((whole, fraction)) => (whole, Some(fraction)),
            None => (major.as_str(), None),
        };

        let grouped = group_indian(whole);
        match fraction {
            Some(fraction) => format!("{CURRENCY_SYMBOL}{grouped}.{fraction}"),
            None => format!("{CURRENCY_SYMBOL}{grouped}"),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<u64> for Price {
    fn from(minor: u64) -> Self {
        Self(minor)
    }
}

/// Group digits as lakh/crore: last three digits, then pairs.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut pairs: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        pairs.push(pair);
        rest = front;
    }
    pairs.push(rest);
    pairs.reverse();

    format!("{},{tail}", pairs.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_whole_amount() {
        assert_eq!(Price::from_minor(1200).display(), "₹12");
    }

    #[test]
    fn test_display_trims_trailing_zero() {
        assert_eq!(Price::from_minor(1250).display(), "₹12.5");
        assert_eq!(Price::from_minor(1234).display(), "₹12.34");
    }

    #[test]
    fn test_display_indian_grouping() {
        assert_eq!(Price::from_minor(123_456_789).display(), "₹12,34,567.89");
        assert_eq!(Price::from_minor(10_000_000).display(), "₹1,00,000");
        assert_eq!(Price::from_minor(99_900).display(), "₹999");
    }

    #[test]
    fn test_display_zero() {
        assert_eq!(Price::ZERO.display(), "₹0");
    }

    #[test]
    fn test_to_decimal_is_exact() {
        assert_eq!(Price::from_minor(1234).to_decimal().to_string(), "12.34");
    }

    #[test]
    fn test_checked_arithmetic_overflow() {
        assert_eq!(Price::from_minor(u64::MAX).checked_mul(2), None);
        assert_eq!(Price::from_minor(u64::MAX).checked_add(Price::from_minor(1)), None);
        assert_eq!(
            Price::from_minor(250).checked_mul(3),
            Some(Price::from_minor(750))
        );
    }

    #[test]
    fn test_serde_is_integer() {
        let json = serde_json::to_string(&Price::from_minor(1234)).unwrap_or_default();
        assert_eq!(json, "1234");
        let back: Price = serde_json::from_str("1234").unwrap_or_default();
        assert_eq!(back.minor_units(), 1234);
    }
}
