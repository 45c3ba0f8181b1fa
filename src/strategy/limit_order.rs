//! Limit orders with pro-rata partial fills.
//!
//! A partial fill re-locks the rest of the order at the script address with a
//! datum linked to the consumed UTxO. A full fill pays the owner directly and
//! tags the payment with the consumed reference so the validator can match it.
use tracing::debug;

use super::{give, order_datum, take, FillContext, Settlement, MIN_UTXO_LOVELACE};
use crate::error::{SettlementError, SettlementResult};
use crate::models::{
    LimitOrderDatum, OrderDatum, OrderKind, OutputReference, Redeemer, TxOutput, Utxo, Value,
    LOVELACE,
};

/// Result of applying a fill to a limit order datum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LimitFillOutcome {
    /// Amount of the buy asset the filler owes the order.
    pub fill_buy_amount: u64,
    /// Remaining order, present only for partial fills.
    pub successor: Option<LimitOrderDatum>,
}

/// Apply a fill of `fill_sell_amount` to `current`.
///
/// `fill_buy_amount = floor(fill_sell_amount * buy_amount / sell_amount)`.
pub fn fill(
    current: &LimitOrderDatum,
    fill_sell_amount: u64,
    is_partial: bool,
    from: &OutputReference,
) -> SettlementResult<LimitFillOutcome> {
    if current.sell_amount == 0 {
        return Err(SettlementError::datum("limit order sells nothing"));
    }
    if fill_sell_amount == 0 || fill_sell_amount > current.sell_amount {
        return Err(SettlementError::Overfill(format!(
            "fill of {} outside (0, {}]",
            fill_sell_amount, current.sell_amount
        )));
    }
    if is_partial && fill_sell_amount == current.sell_amount {
        return Err(SettlementError::Overfill(
            "partial fill must leave something to sell".into(),
        ));
    }
    if !is_partial && fill_sell_amount != current.sell_amount {
        return Err(SettlementError::Overfill(format!(
            "full fill must take all {}, got {}",
            current.sell_amount, fill_sell_amount
        )));
    }

    let fill_buy_amount = (fill_sell_amount as u128 * current.buy_amount as u128
        / current.sell_amount as u128) as u64;

    let successor = if is_partial {
        if fill_buy_amount == 0 {
            return Err(SettlementError::Overfill(format!(
                "fill of {} pays nothing at {}/{}",
                fill_sell_amount, current.buy_amount, current.sell_amount
            )));
        }
        Some(LimitOrderDatum {
            sell_amount: current.sell_amount - fill_sell_amount,
            buy_amount: current.buy_amount - fill_buy_amount,
            from_utxo: Some(from.clone()),
            ..current.clone()
        })
    } else {
        None
    };

    Ok(LimitFillOutcome {
        fill_buy_amount,
        successor,
    })
}

/// Initial order output: the sell amount plus min-UTxO lovelace when selling a token.
pub fn place(address: &str, datum: LimitOrderDatum) -> SettlementResult<TxOutput> {
    let mut value = Value::new().with_token(&datum.sell_asset, datum.sell_amount);
    if !datum.sell_asset.is_lovelace() {
        value.add(LOVELACE, MIN_UTXO_LOVELACE);
    }
    super::place(address, &OrderDatum::LimitOrder(datum), value)
}

/// Settle `order` for `fill_sell_amount`; the produced output lands at
/// `ctx.output_offset`.
pub fn settle(
    order: &Utxo,
    fill_sell_amount: u64,
    is_partial: bool,
    ctx: &FillContext,
) -> SettlementResult<Settlement> {
    let datum = match order_datum(order, OrderKind::LimitOrder)? {
        OrderDatum::LimitOrder(d) => d,
        other => {
            return Err(SettlementError::datum(format!(
                "{:?} is not a limit order",
                other.kind()
            )))
        }
    };
    let reference = order.reference();
    let outcome = fill(&datum, fill_sell_amount, is_partial, &reference)?;

    let mut value = order.value.clone();
    take(&mut value, &datum.sell_asset.unit(), fill_sell_amount)?;
    give(&mut value, &datum.buy_asset.unit(), outcome.fill_buy_amount)?;

    let output = match &outcome.successor {
        Some(next) => {
            super::place(&order.address, &OrderDatum::LimitOrder(next.clone()), value)?
        }
        None => TxOutput::new(&ctx.owner_address(&datum.owner)?, value)
            .with_datum(reference.encode()?),
    };

    let redeemer = Redeemer::LimitFill {
        index_input: ctx.index_input(&reference)?,
        index_output: ctx.output_offset,
        partial: is_partial,
    };
    debug!(
        order = %reference,
        sold = fill_sell_amount,
        bought = outcome.fill_buy_amount,
        partial = is_partial,
        "limit order fill"
    );
    Ok(Settlement::new(order.clone(), redeemer, vec![output]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cbor::PlutusData;
    use crate::models::Token;
    use crate::strategy::fixtures::*;
    use crate::utils::Network;

    fn order() -> LimitOrderDatum {
        LimitOrderDatum {
            owner: ALICE.to_string(),
            sell_asset: pizada(),
            buy_asset: Token::Lovelace,
            sell_amount: 42,
            buy_amount: 420_000_000,
            from_utxo: None,
        }
    }

    fn from() -> OutputReference {
        OutputReference::new(&"dd".repeat(32), 0)
    }

    #[test]
    fn test_partial_fill_is_pro_rata() {
        let outcome = fill(&order(), 20, true, &from()).unwrap();
        assert_eq!(outcome.fill_buy_amount, 200_000_000);
        let next = outcome.successor.unwrap();
        assert_eq!(next.sell_amount, 22);
        assert_eq!(next.buy_amount, 220_000_000);
        assert_eq!(next.from_utxo, Some(from()));
        assert_eq!(next.owner, ALICE);
    }

    #[test]
    fn test_full_and_partial_are_exclusive() {
        assert!(fill(&order(), 42, false, &from()).unwrap().successor.is_none());
        assert!(matches!(
            fill(&order(), 42, true, &from()),
            Err(SettlementError::Overfill(_))
        ));
        assert!(matches!(
            fill(&order(), 20, false, &from()),
            Err(SettlementError::Overfill(_))
        ));
        assert!(matches!(
            fill(&order(), 0, true, &from()),
            Err(SettlementError::Overfill(_))
        ));
        assert!(matches!(
            fill(&order(), 43, false, &from()),
            Err(SettlementError::Overfill(_))
        ));
    }

    #[test]
    fn test_ratio_is_preserved_within_truncation() {
        let d = LimitOrderDatum {
            sell_amount: 7,
            buy_amount: 100,
            ..order()
        };
        for amount in 1..7 {
            let next = fill(&d, amount, true, &from()).unwrap().successor.unwrap();
            assert!(next.sell_amount < d.sell_amount);
            // remaining buy never drops below the original price for what is left
            assert!(next.buy_amount as u128 * 7 >= next.sell_amount as u128 * 100);
        }
    }

    #[test]
    fn test_settle_partial_relocks_at_order_address() {
        let value = place(&script_address(), order()).unwrap().value;
        let utxo = order_utxo("bb", &OrderDatum::LimitOrder(order()), value);
        let wallet = wallet_utxo("aa", Value::lovelace(500_000_000));
        let ctx = FillContext::new(Network::Testnet).with_inputs(&[wallet]);
        let s = settle(&utxo, 20, true, &ctx).unwrap();

        assert_eq!(
            s.redeemer,
            Redeemer::LimitFill {
                index_input: 1,
                index_output: 0,
                partial: true
            }
        );
        let out = &s.produced[0];
        assert_eq!(out.address, utxo.address);
        assert_eq!(out.value.amount_of(&pizada()), 22);
        assert_eq!(out.value.get(LOVELACE), MIN_UTXO_LOVELACE + 200_000_000);
        let cbor = out.inline_datum.as_deref().unwrap();
        let next = OrderDatum::decode(OrderKind::LimitOrder, cbor).unwrap();
        assert_eq!(next.from_utxo(), Some(&utxo.reference()));
    }

    #[test]
    fn test_settle_full_pays_owner_with_reference_datum() {
        let value = place(&script_address(), order()).unwrap().value;
        let utxo = order_utxo("bb", &OrderDatum::LimitOrder(order()), value);
        let ctx = FillContext::new(Network::Testnet).at_output(1);
        let s = settle(&utxo, 42, false, &ctx).unwrap();

        let out = &s.produced[0];
        assert_eq!(out.address, ctx.owner_address(ALICE).unwrap());
        assert_eq!(out.value, Value::lovelace(MIN_UTXO_LOVELACE + 420_000_000));
        assert_eq!(
            out.inline_datum.as_deref(),
            Some(utxo.reference().to_cbor_hex().as_str())
        );
        assert_eq!(s.redeemer.index_output(), Some(1));
    }

    #[test]
    fn test_settle_detects_short_order_value() {
        let value = Value::lovelace(2_000_000);
        let utxo = order_utxo("bb", &OrderDatum::LimitOrder(order()), value);
        let ctx = FillContext::new(Network::Testnet);
        let err = settle(&utxo, 20, true, &ctx).unwrap_err();
        assert!(matches!(err, SettlementError::InsufficientLiquidity { .. }));
    }
}
