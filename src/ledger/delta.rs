/// Net value movement of a transaction, per address and asset.
///
/// Used for auditing and reports only; validators never see it.
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::cbor::PlutusData;
use crate::models::{Holding, OutputReference, Redeemer, TxOutput, TxRequest, Utxo};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerDelta {
    entries: BTreeMap<(String, String), i128>,
}

impl LedgerDelta {
    pub fn get(&self, address: &str, unit: &str) -> i128 {
        self.entries
            .get(&(address.to_string(), unit.to_string()))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, i128)> {
        self.entries
            .iter()
            .map(|((a, u), d)| (a.as_str(), u.as_str(), *d))
    }

    /// Sum over all addresses, per unit. Zero everywhere except the fee
    /// (and minted assets) for a balanced transaction.
    pub fn total(&self) -> BTreeMap<String, i128> {
        let mut totals: BTreeMap<String, i128> = BTreeMap::new();
        for (_, unit, delta) in self.iter() {
            *totals.entry(unit.to_string()).or_insert(0) += delta;
        }
        totals.retain(|_, d| *d != 0);
        totals
    }

    pub fn by_address(&self) -> BTreeMap<String, Vec<AssetDelta>> {
        let mut grouped: BTreeMap<String, Vec<AssetDelta>> = BTreeMap::new();
        for (address, unit, value) in self.iter() {
            grouped.entry(address.to_string()).or_default().push(AssetDelta {
                asset: unit.to_string(),
                value,
            });
        }
        grouped
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetDelta {
    pub asset: String,
    pub value: i128,
}

/// Subtract what `consumed` held and add what `produced` holds.
pub fn compute_delta<C: Holding, P: Holding>(consumed: &[C], produced: &[P]) -> LedgerDelta {
    let mut entries: BTreeMap<(String, String), i128> = BTreeMap::new();
    for input in consumed {
        for (unit, amount) in input.value().iter() {
            *entries
                .entry((input.address().to_string(), unit.to_string()))
                .or_insert(0) -= amount as i128;
        }
    }
    for output in produced {
        for (unit, amount) in output.value().iter() {
            *entries
                .entry((output.address().to_string(), unit.to_string()))
                .or_insert(0) += amount as i128;
        }
    }
    entries.retain(|_, d| *d != 0);
    LedgerDelta { entries }
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeemerRecord {
    pub input: OutputReference,
    pub redeemer: Redeemer,
    pub cbor: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TxDetails {
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<TxOutput>,
    pub reference_inputs: Vec<OutputReference>,
    pub redeemers: Vec<RedeemerRecord>,
}

/// Human-oriented summary of a transaction before it is submitted.
#[derive(Debug, Clone, Serialize)]
pub struct TxRecord {
    pub fees: u64,
    /// Net movement per address, with known addresses replaced by nicknames.
    pub balance: BTreeMap<String, Vec<AssetDelta>>,
    pub details: TxDetails,
}

impl TxRecord {
    /// `inputs` are the resolved UTxOs of `tx.inputs`.
    pub fn new(tx: &TxRequest, inputs: Vec<Utxo>, known: &HashMap<String, String>) -> Self {
        let delta = compute_delta(&inputs, &tx.outputs);
        let balance = delta
            .by_address()
            .into_iter()
            .map(|(address, values)| {
                let name = known.get(&address).cloned().unwrap_or(address);
                (name, values)
            })
            .collect();

        let redeemers = tx
            .script_spends
            .iter()
            .map(|s| RedeemerRecord {
                input: s.input.clone(),
                redeemer: s.redeemer,
                cbor: s.redeemer.to_cbor_hex(),
            })
            .collect();

        Self {
            fees: tx.fee,
            balance,
            details: TxDetails {
                inputs,
                outputs: tx.outputs.clone(),
                reference_inputs: tx.reference_inputs.clone(),
                redeemers,
            },
        }
    }
}
