//! Settlement strategies, one per order validator.
//!
//! Every strategy is a pure function of the order UTxO and a fill intent. It
//! returns a [`Settlement`]: the order input to consume, the redeemer to spend
//! it with, and the outputs that must appear in the transaction starting at
//! [`FillContext::output_offset`].
use tracing::debug;

use crate::error::{SettlementError, SettlementResult};
use crate::ledger::{compute_delta, resolve_index, LedgerDelta};
use crate::models::{
    OrderDatum, OrderKind, OutputReference, Redeemer, TxOutput, Utxo, ValidityInterval, Value,
};
use crate::utils::{key_hash_to_address, Network};

pub mod always_succeed;
pub mod decay;
pub mod grid_order;
pub mod limit_order;
pub mod liquidity_bin;
pub mod mint;
pub mod sliding_order;
pub mod vault;

/// Lovelace attached to outputs that carry native tokens.
pub const MIN_UTXO_LOVELACE: u64 = 2_000_000;

/// Where the order's input and outputs will sit in the final transaction.
#[derive(Debug, Clone)]
pub struct FillContext {
    pub network: Network,
    /// Every other input the transaction consumes (usually the filler's wallet UTxOs).
    pub other_inputs: Vec<OutputReference>,
    /// Output position of the first output the strategy produces.
    pub output_offset: u64,
}

impl FillContext {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            other_inputs: Vec::new(),
            output_offset: 0,
        }
    }

    pub fn with_inputs(mut self, inputs: &[Utxo]) -> Self {
        self.other_inputs.extend(inputs.iter().map(Utxo::reference));
        self
    }

    pub fn at_output(mut self, output_offset: u64) -> Self {
        self.output_offset = output_offset;
        self
    }

    /// Ledger index of `order` once combined with the other inputs.
    pub fn index_input(&self, order: &OutputReference) -> SettlementResult<u64> {
        let mut all = self.other_inputs.clone();
        all.push(order.clone());
        resolve_index(&all, order).map(|i| i as u64)
    }

    pub fn owner_address(&self, owner: &str) -> SettlementResult<String> {
        key_hash_to_address(owner, self.network).map_err(SettlementError::datum)
    }
}

/// What a strategy decided for one order UTxO.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub spent: Utxo,
    pub redeemer: Redeemer,
    pub produced: Vec<TxOutput>,
    pub required_signers: Vec<String>,
    pub reference_inputs: Vec<OutputReference>,
    pub validity: ValidityInterval,
}

impl Settlement {
    fn new(spent: Utxo, redeemer: Redeemer, produced: Vec<TxOutput>) -> Self {
        Self {
            spent,
            redeemer,
            produced,
            required_signers: Vec::new(),
            reference_inputs: Vec::new(),
            validity: ValidityInterval::default(),
        }
    }

    /// Movement caused by this settlement alone, before the filler balances it.
    pub fn delta(&self) -> LedgerDelta {
        compute_delta(std::slice::from_ref(&self.spent), &self.produced)
    }
}

/// Decode the inline datum of `utxo` as an order of `kind`.
pub fn order_datum(utxo: &Utxo, kind: OrderKind) -> SettlementResult<OrderDatum> {
    let cbor = utxo.inline_datum.as_deref().ok_or_else(|| {
        SettlementError::DatumMismatch(format!("{} carries no inline datum", utxo.reference()))
    })?;
    OrderDatum::decode(kind, cbor)
        .map_err(|e| SettlementError::DatumMismatch(format!("{}: {}", utxo.reference(), e)))
}

pub(crate) fn ensure_owner(owner: &str, signer: &str) -> SettlementResult<()> {
    if !owner.eq_ignore_ascii_case(signer) {
        return Err(SettlementError::Unauthorized {
            signer: signer.to_string(),
            owner: owner.to_string(),
        });
    }
    Ok(())
}

/// Remove `amount` of `unit` from `value`, failing with the shortfall.
pub(crate) fn take(value: &mut Value, unit: &str, amount: u64) -> SettlementResult<()> {
    let available = value.get(unit);
    value
        .checked_sub(unit, amount)
        .ok_or_else(|| SettlementError::InsufficientLiquidity {
            unit: unit.to_string(),
            available,
            required: amount,
        })
}

/// Add `amount` of `unit` to `value`, failing when the total overflows.
pub(crate) fn give(value: &mut Value, unit: &str, amount: u64) -> SettlementResult<()> {
    let held = value.get(unit);
    value.checked_add(unit, amount).ok_or_else(|| {
        SettlementError::Overfill(format!("{} {} plus {} overflows", held, unit, amount))
    })
}

/// Initial deposit of an order: `value` locked at `address` with `datum`.
pub fn place(address: &str, datum: &OrderDatum, value: Value) -> SettlementResult<TxOutput> {
    let cbor = datum.encode()?;
    debug!(kind = ?datum.kind(), address, "placing order");
    Ok(TxOutput::new(address, value).with_datum(cbor))
}

/// Owner withdraws the whole order back to their key address.
pub fn cancel(
    order: &Utxo,
    kind: OrderKind,
    signer: &str,
    ctx: &FillContext,
) -> SettlementResult<Settlement> {
    let datum = order_datum(order, kind)?;
    ensure_owner(datum.owner(), signer)?;

    let index_input = ctx.index_input(&order.reference())?;
    let index_output = ctx.output_offset;
    let redeemer = match kind {
        OrderKind::Vault => Redeemer::Void,
        OrderKind::LimitOrder => Redeemer::LimitFill {
            index_input,
            index_output,
            partial: false,
        },
        _ => Redeemer::Indexed {
            index_input,
            index_output,
        },
    };
    let payout = TxOutput::new(&ctx.owner_address(datum.owner())?, order.value.clone());

    debug!(order = %order.reference(), ?kind, "cancelling order");
    let mut settlement = Settlement::new(order.clone(), redeemer, vec![payout]);
    settlement.required_signers.push(datum.owner().to_string());
    Ok(settlement)
}
