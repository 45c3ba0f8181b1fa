//! Sliding orders: limit orders whose asking price decays with ledger time.
//!
//! Sliding orders keep no chain link. Every fill consumes the order; any
//! unfilled remainder is re-issued as a fresh order right after the payment.
use tracing::debug;

use super::decay::window_quote;
use super::{give, order_datum, take, FillContext, Settlement, MIN_UTXO_LOVELACE};
use crate::error::{SettlementError, SettlementResult};
use crate::models::{
    OrderDatum, OrderKind, Redeemer, SlidingOrderDatum, TxOutput, Utxo, ValidityInterval, Value,
    LOVELACE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlidingFill {
    /// Whole-order buy amount over the validity window.
    pub quote: u64,
    pub fill_buy_amount: u64,
    /// Order re-issued for the unfilled part, if any.
    pub remainder: Option<SlidingOrderDatum>,
}

/// Price a fill of `fill_sell_amount` inside `validity`.
pub fn fill(
    datum: &SlidingOrderDatum,
    fill_sell_amount: u64,
    validity: &ValidityInterval,
) -> SettlementResult<SlidingFill> {
    if fill_sell_amount == 0 || fill_sell_amount > datum.sell_amount {
        return Err(SettlementError::Overfill(format!(
            "fill of {} outside (0, {}]",
            fill_sell_amount, datum.sell_amount
        )));
    }
    let sell = datum.sell_amount as u128;
    let quote = window_quote(datum, validity)?;
    let fill_buy_amount = (fill_sell_amount as u128 * quote as u128 / sell) as u64;

    let remainder = if fill_sell_amount < datum.sell_amount {
        if fill_buy_amount == 0 {
            return Err(SettlementError::Overfill(format!(
                "{} of {} pays nothing at a quote of {}",
                fill_sell_amount, datum.sell_amount, quote
            )));
        }
        let left = datum.sell_amount - fill_sell_amount;
        let start_paid = (fill_sell_amount as u128 * datum.buy_amount_start as u128 / sell) as u64;
        Some(SlidingOrderDatum {
            sell_amount: left,
            buy_amount_start: datum.buy_amount_start - start_paid,
            buy_amount_slope_per_ms: datum
                .buy_amount_slope_per_ms
                .scaled(left, datum.sell_amount)?,
            ..datum.clone()
        })
    } else {
        None
    };

    Ok(SlidingFill {
        quote,
        fill_buy_amount,
        remainder,
    })
}

/// Initial order output locking the sell amount.
pub fn place(address: &str, datum: SlidingOrderDatum) -> SettlementResult<TxOutput> {
    let mut value = Value::new().with_token(&datum.sell_asset, datum.sell_amount);
    if !datum.sell_asset.is_lovelace() {
        value.add(LOVELACE, MIN_UTXO_LOVELACE);
    }
    super::place(address, &OrderDatum::SlidingOrder(datum), value)
}

/// Settle `order` inside `validity`.
///
/// Output `ctx.output_offset` pays the owner. On a partial fill the remainder
/// order follows at the next position and keeps the order's own lovelace.
pub fn settle(
    order: &Utxo,
    fill_sell_amount: u64,
    validity: ValidityInterval,
    ctx: &FillContext,
) -> SettlementResult<Settlement> {
    let datum = match order_datum(order, OrderKind::SlidingOrder)? {
        OrderDatum::SlidingOrder(d) => d,
        other => {
            return Err(SettlementError::datum(format!(
                "{:?} is not a sliding order",
                other.kind()
            )))
        }
    };
    let outcome = fill(&datum, fill_sell_amount, &validity)?;
    let reference = order.reference();
    let owner = ctx.owner_address(&datum.owner)?;

    let mut left = order.value.clone();
    take(&mut left, &datum.sell_asset.unit(), fill_sell_amount)?;

    let mut produced = Vec::with_capacity(2);
    match outcome.remainder {
        None => {
            give(&mut left, &datum.buy_asset.unit(), outcome.fill_buy_amount)?;
            produced.push(TxOutput::new(&owner, left).with_datum(reference.encode()?));
        }
        Some(rest) => {
            let mut payment = Value::new().with_token(&datum.buy_asset, outcome.fill_buy_amount);
            if !datum.buy_asset.is_lovelace() {
                payment.add(LOVELACE, MIN_UTXO_LOVELACE);
            }
            produced.push(TxOutput::new(&owner, payment).with_datum(reference.encode()?));
            produced.push(super::place(
                &order.address,
                &OrderDatum::SlidingOrder(rest),
                left,
            )?);
        }
    }

    let redeemer = Redeemer::Indexed {
        index_input: ctx.index_input(&reference)?,
        index_output: ctx.output_offset,
    };
    debug!(
        order = %reference,
        valid_from = ?validity.valid_from,
        valid_to = ?validity.valid_to,
        quote = outcome.quote,
        paid = outcome.fill_buy_amount,
        "sliding order fill"
    );
    let mut settlement = Settlement::new(order.clone(), redeemer, produced);
    settlement.validity = validity;
    Ok(settlement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Rational, Token};
    use crate::strategy::decay::quote;
    use crate::strategy::fixtures::*;
    use crate::utils::Network;

    const START: i64 = 1_700_000_000_000;

    fn order() -> SlidingOrderDatum {
        SlidingOrderDatum {
            owner: ALICE.to_string(),
            sell_asset: pizada(),
            buy_asset: Token::Lovelace,
            sell_amount: 42,
            buy_amount_start: 420_000_000,
            buy_amount_slope_per_ms: Rational::new(-1_000_000, 1000).unwrap(),
            start_time: START,
        }
    }

    fn window(from_ms: u64, width: u64) -> ValidityInterval {
        ValidityInterval::between(START as u64 + from_ms, START as u64 + from_ms + width)
    }

    #[test]
    fn test_full_fill_after_one_block() {
        let out = fill(&order(), 42, &window(20_000, 0)).unwrap();
        assert_eq!(out.quote, 400_000_000);
        assert_eq!(out.fill_buy_amount, 400_000_000);
        assert!(out.remainder.is_none());
    }

    #[test]
    fn test_wider_window_costs_more() {
        let out = fill(&order(), 42, &window(20_000, 10_000)).unwrap();
        assert_eq!(out.fill_buy_amount, 410_000_000);
    }

    #[test]
    fn test_partial_fill_scales_remainder() {
        let out = fill(&order(), 21, &window(20_000, 0)).unwrap();
        assert_eq!(out.fill_buy_amount, 200_000_000);
        let rest = out.remainder.unwrap();
        assert_eq!(rest.sell_amount, 21);
        assert_eq!(rest.buy_amount_start, 210_000_000);
        assert_eq!(rest.buy_amount_slope_per_ms, Rational::new(-500, 1).unwrap());
        assert_eq!(rest.start_time, START);
        // the remainder asks the same unit price as the original at any time
        assert_eq!(quote(&rest, START as u64 + 20_000), 200_000_000);
    }

    #[test]
    fn test_partial_fill_must_pay_something() {
        let cheap = SlidingOrderDatum {
            sell_amount: 1000,
            buy_amount_start: 999,
            buy_amount_slope_per_ms: Rational::new(0, 1).unwrap(),
            ..order()
        };
        let err = fill(&cheap, 1, &window(0, 0)).unwrap_err();
        assert!(matches!(err, SettlementError::Overfill(_)));
        assert_eq!(fill(&cheap, 2, &window(0, 0)).unwrap().fill_buy_amount, 1);
    }

    #[test]
    fn test_rejects_overfill() {
        assert!(matches!(
            fill(&order(), 43, &window(0, 0)),
            Err(SettlementError::Overfill(_))
        ));
        assert!(fill(&order(), 0, &window(0, 0)).is_err());
    }

    #[test]
    fn test_settle_prices_the_whole_window() {
        let value = place(&script_address(), order()).unwrap().value;
        let utxo = order_utxo("bb", &OrderDatum::SlidingOrder(order()), value);
        let ctx = FillContext::new(Network::Testnet);
        let s = settle(&utxo, 42, window(20_000, 10_000), &ctx).unwrap();

        assert_eq!(s.produced.len(), 1);
        assert_eq!(
            s.produced[0].value,
            Value::lovelace(MIN_UTXO_LOVELACE + 410_000_000)
        );
        assert_eq!(s.validity.valid_from, Some(START as u64 + 20_000));

        let err = settle(&utxo, 42, ValidityInterval::default(), &ctx).unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInterval(_)));
        let open_ended = ValidityInterval {
            valid_from: Some(START as u64 + 20_000),
            valid_to: None,
        };
        let err = settle(&utxo, 42, open_ended, &ctx).unwrap_err();
        assert!(matches!(err, SettlementError::InvalidInterval(_)));
    }

    #[test]
    fn test_settle_partial_reissues_after_payment() {
        let value = place(&script_address(), order()).unwrap().value;
        let utxo = order_utxo("bb", &OrderDatum::SlidingOrder(order()), value);
        let ctx = FillContext::new(Network::Testnet).at_output(2);
        let s = settle(&utxo, 21, window(0, 0), &ctx).unwrap();

        assert_eq!(s.redeemer.index_output(), Some(2));
        assert_eq!(s.produced.len(), 2);
        assert_eq!(s.produced[0].value, Value::lovelace(210_000_000));
        let rest = &s.produced[1];
        assert_eq!(rest.address, utxo.address);
        assert_eq!(rest.value.amount_of(&pizada()), 21);
        assert_eq!(rest.value.get(LOVELACE), MIN_UTXO_LOVELACE);
    }
}
