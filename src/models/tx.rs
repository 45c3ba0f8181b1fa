use crate::models::{OutputReference, Redeemer, TxOutput};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// POSIX-millisecond bounds a transaction is valid within.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityInterval {
    pub valid_from: Option<u64>,
    pub valid_to: Option<u64>,
}

impl ValidityInterval {
    pub fn between(valid_from: u64, valid_to: u64) -> Self {
        Self {
            valid_from: Some(valid_from),
            valid_to: Some(valid_to),
        }
    }

    pub fn contains(&self, time: u64) -> bool {
        self.valid_from.map_or(true, |from| time >= from)
            && self.valid_to.map_or(true, |to| time <= to)
    }
}

/// A script input together with the redeemer it is spent with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSpend {
    pub input: OutputReference,
    pub redeemer: Redeemer,
}

/// Everything the ledger collaborator needs to sign and submit a transaction.
///
/// Inputs are kept in insertion order; the ledger sorts them itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRequest {
    pub inputs: Vec<OutputReference>,
    pub reference_inputs: Vec<OutputReference>,
    pub outputs: Vec<TxOutput>,
    pub script_spends: Vec<ScriptSpend>,
    /// Signed quantities per unit; negative burns.
    pub mint: BTreeMap<String, i64>,
    pub fee: u64,
    pub required_signers: Vec<String>,
    pub validity: ValidityInterval,
}

impl TxRequest {
    pub fn redeemer_for(&self, input: &OutputReference) -> Option<&Redeemer> {
        self.script_spends
            .iter()
            .find(|s| &s.input == input)
            .map(|s| &s.redeemer)
    }
}
