use rust_decimal::Decimal;
use std::fmt;
use std::iter::Sum;

/// Exact decimal quantity of some currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Amount(value)
    }

    pub fn inner(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.0.is_zero() && self.0.is_sign_negative()
    }

    /// Multiply by an exchange rate, yielding the amount in the rate's quote
    /// currency. `None` when the product is out of range.
    pub fn checked_scale(&self, rate: Decimal) -> Option<Self> {
        self.0.checked_mul(rate).map(Amount)
    }

    pub fn checked_add(&self, rhs: Amount) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    pub fn checked_sub(&self, rhs: Amount) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount(value)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // normalize drops trailing zeros; Decimal never prints exponents
        write!(f, "{}", self.0.normalize())
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::ops::Neg for Amount {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Amount(-self.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, x| acc + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn new_preserves_value() {
        let amount = Amount::new(dec!(12.3456));
        assert_eq!(amount.inner(), dec!(12.3456));
    }

    #[test]
    fn display_drops_trailing_zeros() {
        assert_eq!(Amount::new(dec!(100.0000)).to_string(), "100");
        assert_eq!(Amount::new(dec!(1.50)).to_string(), "1.5");
        assert_eq!(Amount::new(dec!(0.00000001)).to_string(), "0.00000001");
        assert_eq!(Amount::ZERO.to_string(), "0");
    }

    #[test]
    fn display_formats_negative() {
        assert_eq!(Amount::new(dec!(-50.25)).to_string(), "-50.25");
    }

    #[test]
    fn default_is_zero() {
        assert_eq!(Amount::default(), Amount::ZERO);
        assert!(Amount::default().is_zero());
    }

    #[test]
    fn sign_predicates() {
        assert!(Amount::new(dec!(0.1)).is_positive());
        assert!(Amount::new(dec!(-0.1)).is_negative());
        assert!(!Amount::ZERO.is_positive());
        assert!(!Amount::ZERO.is_negative());
    }

    #[test]
    fn add_and_sub() {
        let a = Amount::new(dec!(100));
        let b = Amount::new(dec!(30.5));
        assert_eq!(a + b, Amount::new(dec!(130.5)));
        assert_eq!(a - b, Amount::new(dec!(69.5)));
        assert_eq!(-b, Amount::new(dec!(-30.5)));
    }

    #[test]
    fn add_assign_and_sub_assign() {
        let mut a = Amount::new(dec!(100));
        a += Amount::new(dec!(50));
        assert_eq!(a, Amount::new(dec!(150)));
        a -= Amount::new(dec!(200));
        assert_eq!(a, Amount::new(dec!(-50)));
    }

    #[test]
    fn decimal_arithmetic_is_exact() {
        let mut a = Amount::ZERO;
        for _ in 0..10 {
            a += Amount::new(dec!(0.1));
        }
        assert_eq!(a, Amount::new(dec!(1)));
    }

    #[test]
    fn scale_by_rate() {
        let btc = Amount::new(dec!(0.5));
        assert_eq!(
            btc.checked_scale(dec!(46472.34)),
            Some(Amount::new(dec!(23236.17)))
        );
    }

    #[test]
    fn checked_ops_report_overflow() {
        let max = Amount::new(Decimal::MAX);
        assert_eq!(max.checked_scale(dec!(2)), None);
        assert_eq!(max.checked_add(Amount::new(dec!(1))), None);
        assert_eq!((-max).checked_sub(Amount::new(dec!(1))), None);
        assert_eq!(
            Amount::new(dec!(1)).checked_sub(Amount::new(dec!(3))),
            Some(Amount::new(dec!(-2)))
        );
    }

    #[test]
    fn sum_of_amounts() {
        let total: Amount = [dec!(1), dec!(2.5), dec!(-0.5)]
            .into_iter()
            .map(Amount::new)
            .sum();
        assert_eq!(total, Amount::new(dec!(3)));
    }

    #[test]
    fn ordering() {
        let negative = Amount::new(dec!(-1));
        let positive = Amount::new(dec!(1));
        assert!(negative < Amount::ZERO);
        assert!(Amount::ZERO < positive);
    }
}
