//! Liquidity bins swap at a fixed rate in either direction.
use tracing::debug;

use super::{give, order_datum, take, FillContext, Settlement};
use crate::error::{SettlementError, SettlementResult};
use crate::models::{
    LiquidityBinDatum, OrderDatum, OrderKind, OutputReference, Redeemer, Token, TxOutput, Utxo,
    Value,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinSwap {
    pub asset_out: Token,
    pub amount_out: u64,
    pub successor: LiquidityBinDatum,
    pub successor_value: Value,
}

/// Swap `amount_in` of `asset_in` against the bin holding `value`.
///
/// `amount_out = floor(amount_in * weight_counterparty / weight_same)`.
pub fn swap(
    datum: &LiquidityBinDatum,
    value: &Value,
    asset_in: &Token,
    amount_in: u64,
    from: &OutputReference,
) -> SettlementResult<BinSwap> {
    let (a, b) = &datum.swap_rate;
    let (same, counter) = if &a.asset == asset_in {
        (a, b)
    } else if &b.asset == asset_in {
        (b, a)
    } else {
        return Err(SettlementError::DatumMismatch(format!(
            "bin does not trade {}",
            asset_in.unit()
        )));
    };
    if same.weight == 0 || counter.weight == 0 {
        return Err(SettlementError::datum("bin weights must be positive"));
    }

    let quoted = amount_in as u128 * counter.weight as u128 / same.weight as u128;
    let amount_out = u64::try_from(quoted).map_err(|_| {
        SettlementError::Overfill(format!(
            "{} {} quotes {} which overflows",
            amount_in,
            asset_in.unit(),
            quoted
        ))
    })?;
    if amount_out == 0 {
        return Err(SettlementError::Overfill(format!(
            "{} {} buys nothing at {}:{}",
            amount_in,
            asset_in.unit(),
            same.weight,
            counter.weight
        )));
    }

    let mut successor_value = value.clone();
    take(&mut successor_value, &counter.asset.unit(), amount_out)?;
    give(&mut successor_value, &asset_in.unit(), amount_in)?;

    Ok(BinSwap {
        asset_out: counter.asset.clone(),
        amount_out,
        successor: LiquidityBinDatum {
            from_utxo: Some(from.clone()),
            ..datum.clone()
        },
        successor_value,
    })
}

pub fn place(
    address: &str,
    datum: LiquidityBinDatum,
    value: Value,
) -> SettlementResult<TxOutput> {
    super::place(address, &OrderDatum::LiquidityBin(datum), value)
}

pub fn settle(
    bin: &Utxo,
    asset_in: &Token,
    amount_in: u64,
    ctx: &FillContext,
) -> SettlementResult<Settlement> {
    let datum = match order_datum(bin, OrderKind::LiquidityBin)? {
        OrderDatum::LiquidityBin(d) => d,
        other => {
            return Err(SettlementError::datum(format!(
                "{:?} is not a liquidity bin",
                other.kind()
            )))
        }
    };
    let reference = bin.reference();
    let outcome = swap(&datum, &bin.value, asset_in, amount_in, &reference)?;

    let redeemer = Redeemer::Indexed {
        index_input: ctx.index_input(&reference)?,
        index_output: ctx.output_offset,
    };
    debug!(
        bin = %reference,
        amount_in,
        amount_out = outcome.amount_out,
        asset_out = %outcome.asset_out.unit(),
        "liquidity bin swap"
    );
    let output = place(&bin.address, outcome.successor, outcome.successor_value)?;
    Ok(Settlement::new(bin.clone(), redeemer, vec![output]))
}
