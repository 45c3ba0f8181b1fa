//! The always-succeed validator, spent through a reference script.
use super::{Settlement, MIN_UTXO_LOVELACE};
use crate::cbor::{constr, encode_cbor};
use crate::error::{SettlementError, SettlementResult};
use crate::manifest::Script;
use crate::models::{Redeemer, TxOutput, Utxo, Value};

/// Compiled PlutusV2 code of a validator that accepts any spend.
pub const ALWAYS_SUCCEED_SCRIPT: &str = "49480100002221200101";

pub fn script() -> Script {
    Script::from_compiled("always_succeed", ALWAYS_SUCCEED_SCRIPT)
}

fn void_datum() -> String {
    encode_cbor(&constr(0, vec![]))
}

/// Lock `lovelace` at `address` and publish the script itself as a reference
/// UTxO next to it.
pub fn lock(address: &str, lovelace: u64) -> Vec<TxOutput> {
    vec![
        TxOutput::new(address, Value::lovelace(lovelace)).with_datum(void_datum()),
        TxOutput::new(address, Value::lovelace(MIN_UTXO_LOVELACE))
            .with_datum(void_datum())
            .with_reference_script(ALWAYS_SUCCEED_SCRIPT),
    ]
}

/// Split UTxOs at the script address into (reference script, spendable).
pub fn partition(utxos: &[Utxo]) -> SettlementResult<(&Utxo, Vec<&Utxo>)> {
    let reference = utxos
        .iter()
        .find(|u| u.has_reference_script())
        .ok_or_else(|| SettlementError::TargetNotFound("reference script".into()))?;
    let spendable = utxos.iter().filter(|u| !u.has_reference_script()).collect();
    Ok((reference, spendable))
}

/// Spend `locked` with a void redeemer, reading the validator from `reference`.
pub fn redeem(locked: &Utxo, reference: &Utxo) -> SettlementResult<Settlement> {
    if locked.has_reference_script() {
        return Err(SettlementError::TargetNotFound(format!(
            "{} holds the reference script",
            locked.reference()
        )));
    }
    if !reference.has_reference_script() {
        return Err(SettlementError::TargetNotFound(format!(
            "{} carries no reference script",
            reference.reference()
        )));
    }
    let mut settlement = Settlement::new(locked.clone(), Redeemer::Void, Vec::new());
    settlement.reference_inputs.push(reference.reference());
    Ok(settlement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OutputReference;
    use crate::utils::Network;

    #[test]
    fn test_lock_then_redeem() {
        let address = script().address(Network::Testnet).unwrap();
        let outputs = lock(&address, 100_000_000);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].inline_datum.as_deref(), Some("d87980"));

        let utxos: Vec<Utxo> = outputs
            .into_iter()
            .enumerate()
            .map(|(i, o)| Utxo::from_output(OutputReference::new(&"ab".repeat(32), i as u32), o))
            .collect();
        let (reference, spendable) = partition(&utxos).unwrap();
        assert_eq!(spendable.len(), 1);

        let s = redeem(spendable[0], reference).unwrap();
        assert_eq!(s.redeemer, Redeemer::Void);
        assert!(s.produced.is_empty());
        assert_eq!(s.reference_inputs, vec![reference.reference()]);
        assert!(redeem(reference, spendable[0]).is_err());
    }
}
