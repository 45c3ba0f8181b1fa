use tracing::debug;

use super::{ensure_owner, order_datum, place, Settlement};
use crate::error::{SettlementError, SettlementResult};
use crate::models::{OrderDatum, OrderKind, Redeemer, TxOutput, Utxo, Value, VaultDatum};

/// Deposit `value` into a vault owned by `owner`.
///
/// `address` may carry the owner's stake credential, in which case the locked
/// funds keep delegating while they sit in the vault.
pub fn lock(owner: &str, address: &str, value: Value) -> SettlementResult<TxOutput> {
    let datum = OrderDatum::Vault(VaultDatum {
        owner: owner.to_string(),
    });
    place(address, &datum, value)
}

/// Withdraw everything except `amount_to_keep`, which is re-locked under the
/// same datum. An empty `amount_to_keep` closes the vault.
pub fn request_withdrawal(
    current: &Utxo,
    amount_to_keep: &Value,
    signer: &str,
) -> SettlementResult<Settlement> {
    let datum = match order_datum(current, OrderKind::Vault)? {
        OrderDatum::Vault(d) => d,
        other => return Err(SettlementError::datum(format!("{:?} is not a vault", other.kind()))),
    };
    ensure_owner(&datum.owner, signer)?;

    if !current.value.covers(amount_to_keep) {
        return Err(SettlementError::Overfill(format!(
            "vault {} cannot keep more than it holds",
            current.reference()
        )));
    }

    let mut produced = Vec::new();
    if !amount_to_keep.is_empty() {
        produced.push(lock(&datum.owner, &current.address, amount_to_keep.clone())?);
    }
    debug!(
        vault = %current.reference(),
        closes = produced.is_empty(),
        "vault withdrawal"
    );

    let mut settlement = Settlement::new(current.clone(), Redeemer::Void, produced);
    settlement.required_signers.push(datum.owner);
    Ok(settlement)
}
