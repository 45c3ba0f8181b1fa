use async_trait::async_trait;

use crate::error::SettlementResult;
use crate::models::{OutputReference, TxRequest, Utxo};

pub mod delta;
pub mod emulator;
pub mod input_order;

pub use delta::{compute_delta, AssetDelta, LedgerDelta, TxRecord};
pub use emulator::{Emulator, EmulatorConfig};
pub use input_order::{resolve_index, sort_inputs};

/// Read access to the current UTxO set.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    async fn utxos_at(&self, address: &str) -> SettlementResult<Vec<Utxo>>;

    async fn utxos_by_refs(&self, refs: &[OutputReference]) -> SettlementResult<Vec<Utxo>>;
}

/// A ledger that accepts transactions.
///
/// Submissions are all-or-nothing: either every input is replaced by the
/// outputs, or the call fails with `ValidationRejected` and nothing changes.
#[async_trait]
pub trait Ledger: UtxoSource {
    /// Submit `tx` signed by the key hashes in `witnesses`.
    async fn submit(&self, tx: &TxRequest, witnesses: &[String]) -> SettlementResult<String>;

    /// Current ledger time in POSIX milliseconds.
    async fn now(&self) -> u64;
}
