//! Assemble settlements, wallet inputs and payments into one balanced request.
use std::collections::BTreeMap;

use tracing::debug;

use crate::error::{SettlementError, SettlementResult};
use crate::ledger::{resolve_index, sort_inputs};
use crate::models::{
    OutputReference, ScriptSpend, TxOutput, TxRequest, Utxo, ValidityInterval, Value, LOVELACE,
};
use crate::strategy::Settlement;

/// Flat fee the emulator scenarios pay.
pub const DEFAULT_FEE: u64 = 200_000;

#[derive(Debug, Clone)]
pub struct TxBuilder {
    inputs: Vec<Utxo>,
    script_spends: Vec<ScriptSpend>,
    reference_inputs: Vec<OutputReference>,
    outputs: Vec<TxOutput>,
    mint: BTreeMap<String, i64>,
    required_signers: Vec<String>,
    validity: ValidityInterval,
    fee: u64,
}

impl Default for TxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TxBuilder {
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            script_spends: Vec::new(),
            reference_inputs: Vec::new(),
            outputs: Vec::new(),
            mint: BTreeMap::new(),
            required_signers: Vec::new(),
            validity: ValidityInterval::default(),
            fee: DEFAULT_FEE,
        }
    }

    /// Add key-locked inputs, typically the filler's wallet UTxOs.
    pub fn spend(mut self, utxos: &[Utxo]) -> Self {
        self.inputs.extend_from_slice(utxos);
        self
    }

    /// Add a strategy's order input, redeemer and produced outputs.
    ///
    /// The produced outputs are appended in order, so the settlement must have
    /// been computed with `output_offset == self.next_output()`.
    pub fn settle(mut self, settlement: Settlement) -> SettlementResult<Self> {
        if let Some(index_output) = settlement.redeemer.index_output() {
            if index_output != self.next_output() {
                return Err(SettlementError::InvalidReference(format!(
                    "settlement of {} expects output {}, builder is at {}",
                    settlement.spent.reference(),
                    index_output,
                    self.next_output()
                )));
            }
        }
        self.script_spends.push(ScriptSpend {
            input: settlement.spent.reference(),
            redeemer: settlement.redeemer,
        });
        self.inputs.push(settlement.spent);
        self.outputs.extend(settlement.produced);
        for signer in settlement.required_signers {
            self = self.signer(&signer);
        }
        for reference in settlement.reference_inputs {
            self = self.read_from(reference);
        }
        if settlement.validity != ValidityInterval::default() {
            self.validity = settlement.validity;
        }
        Ok(self)
    }

    pub fn read_from(mut self, reference: OutputReference) -> Self {
        if !self.reference_inputs.contains(&reference) {
            self.reference_inputs.push(reference);
        }
        self
    }

    pub fn pay(mut self, output: TxOutput) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn mint(mut self, quantities: BTreeMap<String, i64>) -> Self {
        for (unit, quantity) in quantities {
            *self.mint.entry(unit).or_insert(0) += quantity;
        }
        self.mint.retain(|_, q| *q != 0);
        self
    }

    pub fn signer(mut self, key_hash: &str) -> Self {
        if !self.required_signers.iter().any(|s| s == key_hash) {
            self.required_signers.push(key_hash.to_string());
        }
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    pub fn validity(mut self, validity: ValidityInterval) -> Self {
        self.validity = validity;
        self
    }

    /// Position the next appended output will take.
    pub fn next_output(&self) -> u64 {
        self.outputs.len() as u64
    }

    pub fn input_refs(&self) -> Vec<OutputReference> {
        self.inputs.iter().map(Utxo::reference).collect()
    }

    /// Balance the transaction, sending whatever is left to `change_address`.
    ///
    /// Returns the request and the resolved inputs it consumes.
    pub fn complete(self, change_address: &str) -> SettlementResult<(TxRequest, Vec<Utxo>)> {
        let refs = self.input_refs();
        sort_inputs(&refs)?;

        for spend in &self.script_spends {
            if let Some(claimed) = spend.redeemer.index_input() {
                let actual = resolve_index(&refs, &spend.input)? as u64;
                if claimed != actual {
                    return Err(SettlementError::InvalidReference(format!(
                        "redeemer of {} claims input {}, ledger index is {}",
                        spend.input, claimed, actual
                    )));
                }
            }
            if let Some(index_output) = spend.redeemer.index_output() {
                if index_output >= self.next_output() {
                    return Err(SettlementError::InvalidReference(format!(
                        "redeemer of {} points at missing output {}",
                        spend.input, index_output
                    )));
                }
            }
        }

        let mut balance: BTreeMap<String, i128> = BTreeMap::new();
        for utxo in &self.inputs {
            for (unit, amount) in utxo.value.iter() {
                *balance.entry(unit.to_string()).or_insert(0) += amount as i128;
            }
        }
        for (unit, quantity) in &self.mint {
            *balance.entry(unit.clone()).or_insert(0) += *quantity as i128;
        }
        for output in &self.outputs {
            for (unit, amount) in output.value.iter() {
                *balance.entry(unit.to_string()).or_insert(0) -= amount as i128;
            }
        }
        *balance.entry(LOVELACE.to_string()).or_insert(0) -= self.fee as i128;

        if let Some((unit, net)) = balance.iter().find(|(_, net)| **net < 0) {
            return Err(SettlementError::InsufficientFunds {
                unit: unit.clone(),
                missing: -net,
            });
        }

        let change = balance
            .into_iter()
            .filter(|(_, net)| *net > 0)
            .map(|(unit, net)| match u64::try_from(net) {
                Ok(amount) => Ok((unit, amount)),
                Err(_) => Err(SettlementError::Overfill(format!(
                    "change of {} {} does not fit one output",
                    net, unit
                ))),
            })
            .collect::<SettlementResult<Value>>()?;

        let mut outputs = self.outputs;
        if !change.is_empty() {
            outputs.push(TxOutput::new(change_address, change));
        }

        debug!(
            inputs = refs.len(),
            outputs = outputs.len(),
            fee = self.fee,
            "transaction balanced"
        );
        let request = TxRequest {
            inputs: refs,
            reference_inputs: self.reference_inputs,
            outputs,
            script_spends: self.script_spends,
            mint: self.mint,
            fee: self.fee,
            required_signers: self.required_signers,
            validity: self.validity,
        };
        Ok((request, self.inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LimitOrderDatum, OrderDatum, Token};
    use crate::strategy::fixtures::*;
    use crate::strategy::{limit_order, FillContext, MIN_UTXO_LOVELACE};
    use crate::utils::{key_hash_to_address, Network};

    fn bob() -> String {
        key_hash_to_address(BOB, Network::Testnet).unwrap()
    }

    #[test]
    fn test_change_goes_last() {
        let wallet = wallet_utxo("aa", Value::lovelace(10_000_000));
        let (tx, inputs) = TxBuilder::new()
            .spend(&[wallet])
            .pay(TxOutput::new(&script_address(), Value::lovelace(3_000_000)))
            .complete(&bob())
            .unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(tx.outputs.len(), 2);
        assert_eq!(tx.outputs[1].address, bob());
        let change = 10_000_000 - 3_000_000 - DEFAULT_FEE;
        assert_eq!(tx.outputs[1].value, Value::lovelace(change));
    }

    #[test]
    fn test_insufficient_funds() {
        let wallet = wallet_utxo("aa", Value::lovelace(1_000_000));
        let err = TxBuilder::new()
            .spend(&[wallet])
            .pay(TxOutput::new(&script_address(), Value::lovelace(3_000_000)))
            .complete(&bob())
            .unwrap_err();
        assert_eq!(
            err,
            SettlementError::InsufficientFunds {
                unit: LOVELACE.to_string(),
                missing: 2_000_000 + DEFAULT_FEE as i128,
            }
        );
    }

    #[test]
    fn test_oversized_change_is_refused() {
        let wallet = [
            wallet_utxo("aa", Value::lovelace(u64::MAX)),
            wallet_utxo("ab", Value::lovelace(u64::MAX)),
        ];
        let err = TxBuilder::new().spend(&wallet).complete(&bob()).unwrap_err();
        assert!(matches!(err, SettlementError::Overfill(_)));
    }

    #[test]
    fn test_settlement_indices_are_checked() {
        let datum = LimitOrderDatum {
            owner: ALICE.to_string(),
            sell_asset: pizada(),
            buy_asset: Token::Lovelace,
            sell_amount: 42,
            buy_amount: 420_000_000,
            from_utxo: None,
        };
        let value = limit_order::place(&script_address(), datum.clone()).unwrap().value;
        let order = order_utxo("bb", &OrderDatum::LimitOrder(datum), value);
        let wallet = wallet_utxo("aa", Value::lovelace(500_000_000));

        // computed without knowing about the wallet input
        let blind = FillContext::new(Network::Testnet);
        let s = limit_order::settle(&order, 42, false, &blind).unwrap();
        let err = TxBuilder::new()
            .spend(&[wallet.clone()])
            .settle(s)
            .unwrap()
            .complete(&bob())
            .unwrap_err();
        assert!(matches!(err, SettlementError::InvalidReference(_)));

        let ctx = FillContext::new(Network::Testnet).with_inputs(&[wallet.clone()]);
        let s = limit_order::settle(&order, 42, false, &ctx).unwrap();
        let (tx, _) = TxBuilder::new()
            .spend(&[wallet])
            .settle(s)
            .unwrap()
            .complete(&bob())
            .unwrap();
        assert_eq!(tx.script_spends.len(), 1);
        assert_eq!(tx.outputs[0].value.get(LOVELACE), MIN_UTXO_LOVELACE + 420_000_000);
        assert_eq!(tx.outputs[1].value.amount_of(&pizada()), 42);
    }

    #[test]
    fn test_duplicate_input_is_ambiguous() {
        let wallet = wallet_utxo("aa", Value::lovelace(10_000_000));
        let err = TxBuilder::new()
            .spend(&[wallet.clone(), wallet])
            .complete(&bob())
            .unwrap_err();
        assert!(matches!(err, SettlementError::AmbiguousOrdering(_)));
    }
}
