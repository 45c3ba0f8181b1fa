//! Time-decaying price of a sliding order.
use crate::error::{SettlementError, SettlementResult};
use crate::models::{SlidingOrderDatum, ValidityInterval};

/// Buy amount the order asks for at `at_time` (POSIX ms).
///
/// `buy_amount_start + ceil(slope * (at_time - start_time))`, with elapsed time
/// clamped at zero before the start and the result clamped at zero. Fractions
/// round up.
pub fn quote(datum: &SlidingOrderDatum, at_time: u64) -> u64 {
    let elapsed = (at_time as i128 - datum.start_time as i128).max(0);
    let price = datum.buy_amount_start as i128 + datum.buy_amount_slope_per_ms.mul_ceil(elapsed);
    price.clamp(0, u64::MAX as i128) as u64
}

/// Buy amount the order asks for when filled anywhere inside `validity`.
///
/// The price is taken at the lower bound and the filler is then charged for
/// the width of the window: `quote(lower) + ceil(|slope| * (upper - lower))`.
/// Both bounds are required.
pub fn window_quote(
    datum: &SlidingOrderDatum,
    validity: &ValidityInterval,
) -> SettlementResult<u64> {
    let (lower, upper) = settlement_window(validity)?;
    let width = (upper - lower) as i128;
    let slope = &datum.buy_amount_slope_per_ms;
    let width_cost = if slope.is_positive() {
        slope.mul_ceil(width)
    } else {
        -slope.mul_floor(width)
    };
    let price = quote(datum, lower) as i128 + width_cost;
    Ok(price.clamp(0, u64::MAX as i128) as u64)
}

/// Bounds of the window a sliding order fill is priced over.
pub fn settlement_window(validity: &ValidityInterval) -> SettlementResult<(u64, u64)> {
    match (validity.valid_from, validity.valid_to) {
        (Some(lower), Some(upper)) if lower <= upper => Ok((lower, upper)),
        (Some(lower), Some(upper)) => Err(SettlementError::InvalidInterval(format!(
            "window [{}, {}] is reversed",
            lower, upper
        ))),
        _ => Err(SettlementError::InvalidInterval(
            "sliding order fills need both validity bounds".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rational, Token};

    fn datum(slope: Rational) -> SlidingOrderDatum {
        SlidingOrderDatum {
            owner: "aa".repeat(28),
            sell_asset: Token::Lovelace,
            buy_asset: Token::Lovelace,
            sell_amount: 42,
            buy_amount_start: 420_000_000,
            buy_amount_slope_per_ms: slope,
            start_time: 1_000_000,
        }
    }

    #[test]
    fn test_one_ada_per_second() {
        let d = datum(Rational::new(-1_000_000, 1000).unwrap());
        assert_eq!(quote(&d, 1_000_000), 420_000_000);
        assert_eq!(quote(&d, 1_020_000), 400_000_000);
        assert_eq!(quote(&d, 1_030_000), 390_000_000);
    }

    #[test]
    fn test_before_start_and_floor() {
        let d = datum(Rational::new(-1_000_000, 1000).unwrap());
        assert_eq!(quote(&d, 0), 420_000_000);
        assert_eq!(quote(&d, 1_000_000 + 420_000), 0);
        assert_eq!(quote(&d, u64::MAX / 2), 0);
    }

    #[test]
    fn test_monotonic_with_slope_sign() {
        let down = datum(Rational::new(-7, 3).unwrap());
        let up = datum(Rational::new(7, 3).unwrap());
        let mut last_down = u64::MAX;
        let mut last_up = 0;
        for t in (1_000_000..1_100_000).step_by(997) {
            let (qd, qu) = (quote(&down, t), quote(&up, t));
            assert!(qd <= last_down);
            assert!(qu >= last_up);
            last_down = qd;
            last_up = qu;
        }
    }

    #[test]
    fn test_window_width_is_charged() {
        let d = datum(Rational::new(-1_000_000, 1000).unwrap());
        // twenty seconds of decay, ten seconds of window
        let window = ValidityInterval::between(1_020_000, 1_030_000);
        assert_eq!(window_quote(&d, &window).unwrap(), 410_000_000);
        let instant = ValidityInterval::between(1_020_000, 1_020_000);
        assert_eq!(window_quote(&d, &instant).unwrap(), 400_000_000);

        let up = datum(Rational::new(7, 3).unwrap());
        let window = ValidityInterval::between(1_000_000, 1_000_010);
        // ceil(70/3) for the window, nothing elapsed yet
        assert_eq!(window_quote(&up, &window).unwrap(), 420_000_024);
    }

    #[test]
    fn test_window_needs_both_bounds() {
        let d = datum(Rational::new(-1, 1).unwrap());
        for open in [
            ValidityInterval {
                valid_from: None,
                valid_to: Some(5),
            },
            ValidityInterval {
                valid_from: Some(5),
                valid_to: None,
            },
            ValidityInterval::between(6, 5),
        ] {
            assert!(matches!(
                window_quote(&d, &open),
                Err(SettlementError::InvalidInterval(_))
            ));
        }
        assert_eq!(settlement_window(&ValidityInterval::between(3, 5)).unwrap(), (3, 5));
    }
}
