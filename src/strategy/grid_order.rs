//! Grid orders: a resting position that flips between two assets.
//!
//! Both ratios are `asset_1` per unit of `asset_2`. While `hold_1` is false the
//! order sits on `asset_2` and buys `asset_1` at `ratio_buy_1`; once filled it
//! holds `asset_1` and sells it back at `ratio_sell_1`.
use tracing::debug;

use super::{give, order_datum, take, FillContext, Settlement};
use crate::error::{SettlementError, SettlementResult};
use crate::models::{
    GridOrderDatum, OrderDatum, OrderKind, OutputReference, Rational, Redeemer, Token, TxOutput,
    Utxo, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridDirection {
    /// The order receives `asset_1` and gives away `asset_2`.
    BuyAsset1,
    /// The order receives `asset_2` and gives away `asset_1`.
    SellAsset1,
}

impl GridDirection {
    pub fn for_hold(hold_1: bool) -> Self {
        if hold_1 {
            GridDirection::SellAsset1
        } else {
            GridDirection::BuyAsset1
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridFill {
    pub direction: GridDirection,
    /// Amount the filler pays into the order.
    pub paid: u64,
    pub successor: GridOrderDatum,
    pub successor_value: Value,
}

fn positive(ratio: &Rational, what: &str) -> SettlementResult<()> {
    if !ratio.is_positive() {
        return Err(SettlementError::DatumMismatch(format!(
            "{} {}/{} is not positive",
            what, ratio.numerator, ratio.denominator
        )));
    }
    Ok(())
}

/// Filler takes `take` of the asset the order currently holds.
pub fn fill(
    datum: &GridOrderDatum,
    value: &Value,
    take_amount: u64,
    from: &OutputReference,
) -> SettlementResult<GridFill> {
    if take_amount == 0 {
        return Err(SettlementError::Overfill("grid fill takes nothing".into()));
    }
    let direction = GridDirection::for_hold(datum.hold_1);
    let (taken, paid_asset, paid) = match direction {
        GridDirection::BuyAsset1 => {
            let r = &datum.ratio_buy_1;
            positive(r, "ratio_buy_1")?;
            (&datum.asset_2, &datum.asset_1, r.mul_ceil(take_amount as i128))
        }
        GridDirection::SellAsset1 => {
            let r = &datum.ratio_sell_1;
            positive(r, "ratio_sell_1")?;
            (&datum.asset_1, &datum.asset_2, r.div_ceil(take_amount as i128)?)
        }
    };
    let paid = u64::try_from(paid)
        .map_err(|_| SettlementError::Overfill(format!("grid payment {} overflows", paid)))?;

    let mut successor_value = value.clone();
    take(&mut successor_value, &taken.unit(), take_amount)?;
    give(&mut successor_value, &paid_asset.unit(), paid)?;

    let successor = GridOrderDatum {
        hold_1: !datum.hold_1,
        from_utxo: Some(from.clone()),
        ..datum.clone()
    };
    Ok(GridFill {
        direction,
        paid,
        successor,
        successor_value,
    })
}

/// Which way a fill went, judged by the asset that increased in the order.
pub fn infer_direction(
    datum: &GridOrderDatum,
    before: &Value,
    after: &Value,
) -> SettlementResult<GridDirection> {
    let up_1 = after.amount_of(&datum.asset_1) > before.amount_of(&datum.asset_1);
    let up_2 = after.amount_of(&datum.asset_2) > before.amount_of(&datum.asset_2);
    match (up_1, up_2) {
        (true, false) => Ok(GridDirection::BuyAsset1),
        (false, true) => Ok(GridDirection::SellAsset1),
        (false, false) => Err(SettlementError::Overfill(
            "grid order gains neither asset".into(),
        )),
        (true, true) => Err(SettlementError::Overfill(
            "grid order cannot gain both assets".into(),
        )),
    }
}

/// Check a proposed successor the way the validator does.
pub fn verify_fill(
    datum: &GridOrderDatum,
    before: &Value,
    successor: &GridOrderDatum,
    after: &Value,
    from: &OutputReference,
) -> SettlementResult<()> {
    let fixed_fields_kept = successor.owner == datum.owner
        && successor.grid_id == datum.grid_id
        && successor.asset_1 == datum.asset_1
        && successor.asset_2 == datum.asset_2
        && successor.ratio_buy_1 == datum.ratio_buy_1
        && successor.ratio_sell_1 == datum.ratio_sell_1;
    if !fixed_fields_kept {
        return Err(SettlementError::datum("grid successor changes fixed fields"));
    }
    if successor.hold_1 == datum.hold_1 {
        return Err(SettlementError::datum("grid successor must flip hold_1"));
    }
    if successor.from_utxo.as_ref() != Some(from) {
        return Err(SettlementError::datum(format!(
            "grid successor must link to {}",
            from
        )));
    }

    let direction = infer_direction(datum, before, after)?;
    if direction != GridDirection::for_hold(datum.hold_1) {
        return Err(SettlementError::Overfill(format!(
            "{:?} while hold_1 is {}",
            direction, datum.hold_1
        )));
    }

    let delta = |asset: &Token| after.amount_of(asset) as i128 - before.amount_of(asset) as i128;
    let (d1, d2) = (delta(&datum.asset_1), delta(&datum.asset_2));
    let price_respected = match direction {
        GridDirection::BuyAsset1 => {
            let r = &datum.ratio_buy_1;
            d1 * r.denominator as i128 >= -d2 * r.numerator as i128
        }
        GridDirection::SellAsset1 => {
            let r = &datum.ratio_sell_1;
            d2 * r.numerator as i128 >= -d1 * r.denominator as i128
        }
    };
    if !price_respected {
        return Err(SettlementError::Overfill(format!(
            "grid fill underpays the order ({} / {})",
            d1, d2
        )));
    }
    Ok(())
}

/// Initial grid order holding `value`.
pub fn place(address: &str, datum: GridOrderDatum, value: Value) -> SettlementResult<TxOutput> {
    super::place(address, &OrderDatum::GridOrder(datum), value)
}

/// Settle `order` with the filler taking `take_amount` of the held asset.
pub fn settle(order: &Utxo, take_amount: u64, ctx: &FillContext) -> SettlementResult<Settlement> {
    let datum = match order_datum(order, OrderKind::GridOrder)? {
        OrderDatum::GridOrder(d) => d,
        other => {
            return Err(SettlementError::datum(format!(
                "{:?} is not a grid order",
                other.kind()
            )))
        }
    };
    let reference = order.reference();
    let outcome = fill(&datum, &order.value, take_amount, &reference)?;
    verify_fill(
        &datum,
        &order.value,
        &outcome.successor,
        &outcome.successor_value,
        &reference,
    )?;

    let redeemer = Redeemer::Indexed {
        index_input: ctx.index_input(&reference)?,
        index_output: ctx.output_offset,
    };
    debug!(
        order = %reference,
        direction = ?outcome.direction,
        taken = take_amount,
        paid = outcome.paid,
        "grid order fill"
    );
    let output = place(&order.address, outcome.successor, outcome.successor_value)?;
    Ok(Settlement::new(order.clone(), redeemer, vec![output]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LOVELACE;
    use crate::strategy::fixtures::*;
    use crate::utils::Network;

    fn grid() -> GridOrderDatum {
        GridOrderDatum {
            owner: ALICE.to_string(),
            grid_id: 0,
            asset_1: Token::Lovelace,
            asset_2: pizada(),
            ratio_buy_1: Rational::new(2_000_000, 1).unwrap(),
            ratio_sell_1: Rational::new(1_000_000, 1).unwrap(),
            hold_1: false,
            from_utxo: None,
        }
    }

    fn from() -> OutputReference {
        OutputReference::new(&"ee".repeat(32), 0)
    }

    #[test]
    fn test_buy_then_sell_round() {
        let start = Value::lovelace(2_000_000).with_token(&pizada(), 42);
        let first = fill(&grid(), &start, 42, &from()).unwrap();
        assert_eq!(first.direction, GridDirection::BuyAsset1);
        assert_eq!(first.paid, 84_000_000);
        assert!(first.successor.hold_1);
        assert_eq!(first.successor_value, Value::lovelace(86_000_000));

        let second = fill(&first.successor, &first.successor_value, 84_000_000, &from()).unwrap();
        assert_eq!(second.direction, GridDirection::SellAsset1);
        assert_eq!(second.paid, 84);
        assert!(!second.successor.hold_1);
        assert_eq!(second.successor_value.amount_of(&pizada()), 84);
        assert_eq!(second.successor_value.get(LOVELACE), 2_000_000);
    }

    #[test]
    fn test_payment_rounds_up() {
        let mut d = grid();
        d.hold_1 = true;
        d.ratio_sell_1 = Rational::new(3, 1).unwrap();
        let value = Value::lovelace(10);
        // 10 lovelace at 3 lovelace per token costs ceil(10/3) tokens
        let out = fill(&d, &value, 10, &from()).unwrap();
        assert_eq!(out.paid, 4);
    }

    #[test]
    fn test_infer_direction() {
        let d = grid();
        let before = Value::lovelace(2_000_000).with_token(&pizada(), 42);
        let after = Value::lovelace(86_000_000);
        assert_eq!(
            infer_direction(&d, &before, &after).unwrap(),
            GridDirection::BuyAsset1
        );
        assert_eq!(
            infer_direction(&d, &after, &before).unwrap(),
            GridDirection::SellAsset1
        );
        assert!(infer_direction(&d, &before, &before).is_err());
        let both = Value::lovelace(3_000_000).with_token(&pizada(), 43);
        assert!(infer_direction(&d, &before, &both).is_err());
    }

    #[test]
    fn test_verify_rejects_underpayment_and_stale_hold() {
        let d = grid();
        let before = Value::lovelace(2_000_000).with_token(&pizada(), 42);
        let mut next = d.clone();
        next.hold_1 = true;
        next.from_utxo = Some(from());

        let cheap = Value::lovelace(80_000_000);
        assert!(matches!(
            verify_fill(&d, &before, &next, &cheap, &from()),
            Err(SettlementError::Overfill(_))
        ));
        let fair = Value::lovelace(86_000_000);
        verify_fill(&d, &before, &next, &fair, &from()).unwrap();

        let mut stale = next.clone();
        stale.hold_1 = false;
        assert!(verify_fill(&d, &before, &stale, &fair, &from()).is_err());
    }

    #[test]
    fn test_settle_stays_at_order_address() {
        let start = Value::lovelace(2_000_000).with_token(&pizada(), 42);
        let utxo = order_utxo("bb", &OrderDatum::GridOrder(grid()), start);
        let ctx = FillContext::new(Network::Testnet)
            .with_inputs(&[wallet_utxo("aa", Value::lovelace(100_000_000))]);
        let s = settle(&utxo, 42, &ctx).unwrap();
        assert_eq!(
            s.redeemer,
            Redeemer::Indexed {
                index_input: 1,
                index_output: 0
            }
        );
        assert_eq!(s.produced[0].address, utxo.address);
        assert_eq!(s.delta().get(&utxo.address, LOVELACE), 84_000_000);
        assert_eq!(s.delta().get(&utxo.address, &pizada().unit()), -42);
    }
}
