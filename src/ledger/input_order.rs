/// Predicts the position the ledger will give each transaction input.
///
/// Validators receive "this is my input's index" through the redeemer, so the
/// index must be known before submission. The ledger sorts inputs by
/// transaction id bytes, then by output index.
use std::cmp::Ordering;

use crate::error::{SettlementError, SettlementResult};
use crate::models::OutputReference;

/// Return the inputs in the order the ledger will present them.
pub fn sort_inputs(inputs: &[OutputReference]) -> SettlementResult<Vec<OutputReference>> {
    let mut keyed = inputs
        .iter()
        .map(|r| {
            hex::decode(&r.tx_hash)
                .map(|bytes| (bytes, r.output_index, r.clone()))
                .map_err(|e| SettlementError::InvalidReference(format!("{}: {}", r, e)))
        })
        .collect::<SettlementResult<Vec<_>>>()?;

    keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));

    for pair in keyed.windows(2) {
        if pair[0].0 == pair[1].0 && pair[0].1 == pair[1].1 {
            return Err(SettlementError::AmbiguousOrdering(pair[0].2.to_string()));
        }
    }

    Ok(keyed.into_iter().map(|(_, _, r)| r).collect())
}

/// Index of `target` among the sorted `inputs`.
pub fn resolve_index(
    inputs: &[OutputReference],
    target: &OutputReference,
) -> SettlementResult<usize> {
    let sorted = sort_inputs(inputs)?;
    sorted
        .iter()
        .position(|r| r.ledger_cmp(target).ok() == Some(Ordering::Equal))
        .ok_or_else(|| SettlementError::TargetNotFound(target.to_string()))
}
