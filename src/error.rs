use thiserror::Error;

/// Errors raised while deciding how to settle an order, or while submitting the
/// resulting transaction.
///
/// Everything except [`SettlementError::ValidationRejected`] and
/// [`SettlementError::Source`] is detected locally before submission and
/// indicates a logic error on the caller's side.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettlementError {
    #[error("signer {signer} is not the owner {owner}")]
    Unauthorized { signer: String, owner: String },
    #[error("overfill: {0}")]
    Overfill(String),
    #[error("insufficient liquidity of {unit}: holds {available}, needs {required}")]
    InsufficientLiquidity {
        unit: String,
        available: u64,
        required: u64,
    },
    #[error("insufficient funds of {unit}: short by {missing}")]
    InsufficientFunds { unit: String, missing: i128 },
    #[error("ambiguous input ordering: {0} appears more than once")]
    AmbiguousOrdering(String),
    #[error("input {0} is not part of the transaction")]
    TargetNotFound(String),
    #[error("invalid output reference: {0}")]
    InvalidReference(String),
    #[error("invalid validity interval: {0}")]
    InvalidInterval(String),
    #[error("datum mismatch: {0}")]
    DatumMismatch(String),
    #[error("transaction rejected by the ledger: {0}")]
    ValidationRejected(String),
    #[error("ledger source error: {0}")]
    Source(String),
}

impl SettlementError {
    /// Whether a caller may retry against refreshed ledger state.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SettlementError::ValidationRejected(_) | SettlementError::Source(_)
        )
    }

    pub(crate) fn datum(e: impl std::fmt::Display) -> Self {
        SettlementError::DatumMismatch(e.to_string())
    }
}

pub type SettlementResult<T> = Result<T, SettlementError>;
