use crate::error::{SettlementError, SettlementResult};
use num_integer::Integer;
use num_rational::Ratio;
use serde::{Deserialize, Serialize};

/// An exact ratio as stored in grid and sliding order datums.
///
/// The stored pair is kept as written on chain apart from the sign, which
/// lives on the numerator. Arithmetic goes through [`Ratio`] over `i128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rational {
    pub numerator: i64,
    pub denominator: i64,
}

fn mismatch(
    numerator: impl std::fmt::Display,
    denominator: impl std::fmt::Display,
    why: &str,
) -> SettlementError {
    SettlementError::DatumMismatch(format!("ratio {}/{} {}", numerator, denominator, why))
}

impl Rational {
    pub fn new(numerator: i64, denominator: i64) -> SettlementResult<Self> {
        if denominator == 0 {
            return Err(mismatch(numerator, denominator, "has a zero denominator"));
        }
        if denominator > 0 {
            return Ok(Self {
                numerator,
                denominator,
            });
        }
        match (numerator.checked_neg(), denominator.checked_neg()) {
            (Some(numerator), Some(denominator)) => Ok(Self {
                numerator,
                denominator,
            }),
            _ => Err(mismatch(numerator, denominator, "cannot be normalised")),
        }
    }

    pub fn ratio(&self) -> Ratio<i128> {
        Ratio::new(self.numerator as i128, self.denominator as i128)
    }

    pub fn is_positive(&self) -> bool {
        self.numerator > 0
    }

    /// `floor(amount * self)`.
    pub fn mul_floor(&self, amount: i128) -> i128 {
        (self.ratio() * amount).floor().to_integer()
    }

    /// `ceil(amount * self)`.
    pub fn mul_ceil(&self, amount: i128) -> i128 {
        (self.ratio() * amount).ceil().to_integer()
    }

    /// `ceil(amount / self)`, for a positive ratio.
    pub fn div_ceil(&self, amount: i128) -> SettlementResult<i128> {
        if !self.is_positive() {
            return Err(mismatch(self.numerator, self.denominator, "is not positive"));
        }
        Ok(Integer::div_ceil(
            &(amount * self.denominator as i128),
            &(self.numerator as i128),
        ))
    }

    /// `self * mul / div` in lowest terms, so it still fits the datum's 64-bit fields.
    pub fn scaled(&self, mul: u64, div: u64) -> SettlementResult<Self> {
        if div == 0 {
            return Err(SettlementError::DatumMismatch("ratio scaled by zero".into()));
        }
        let scaled = self.ratio() * Ratio::new(mul as i128, div as i128);
        let fit = |n: &i128| {
            i64::try_from(*n).map_err(|_| mismatch(scaled.numer(), scaled.denom(), "overflows"))
        };
        Rational::new(fit(scaled.numer())?, fit(scaled.denom())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_denominator_is_normalised() {
        let r = Rational::new(3, -4).unwrap();
        assert_eq!(r.numerator, -3);
        assert_eq!(r.denominator, 4);
        assert!(Rational::new(1, 0).is_err());
    }

    #[test]
    fn test_unnormalisable_ratio_is_rejected() {
        for (n, d) in [(i64::MIN, -1), (1, i64::MIN)] {
            match Rational::new(n, d) {
                Err(SettlementError::DatumMismatch(_)) => {}
                other => panic!("expected DatumMismatch for {}/{}, got {:?}", n, d, other),
            }
        }
        assert!(Rational::new(i64::MIN, 1).is_ok());
    }

    #[test]
    fn test_stored_pair_is_not_reduced() {
        let r = Rational::new(2_000_000, 2).unwrap();
        assert_eq!((r.numerator, r.denominator), (2_000_000, 2));
        assert_eq!(r.ratio(), Ratio::from_integer(1_000_000));
    }

    #[test]
    fn test_rounding_directions() {
        let slope = Rational::new(-1_000_000, 1000).unwrap();
        assert_eq!(slope.mul_floor(20_000), -20_000_000);
        let third = Rational::new(1, 3).unwrap();
        assert_eq!(third.mul_floor(10), 3);
        assert_eq!(third.mul_ceil(10), 4);
        let neg_third = Rational::new(-1, 3).unwrap();
        assert_eq!(neg_third.mul_floor(10), -4);
        assert_eq!(neg_third.mul_ceil(10), -3);
    }

    #[test]
    fn test_div_ceil() {
        let two = Rational::new(2, 1).unwrap();
        assert_eq!(two.div_ceil(7).unwrap(), 4);
        let price = Rational::new(1_000_000, 1).unwrap();
        assert_eq!(price.div_ceil(84_000_000).unwrap(), 84);
        assert_eq!(price.div_ceil(1).unwrap(), 1);
        assert!(Rational::new(-1, 2).unwrap().div_ceil(4).is_err());
    }

    #[test]
    fn test_scaled_reduces() {
        let slope = Rational::new(-1_000_000, 1000).unwrap();
        let half = slope.scaled(21, 42).unwrap();
        assert_eq!(half, Rational::new(-500, 1).unwrap());
    }
}
