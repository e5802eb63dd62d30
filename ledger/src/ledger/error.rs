use crate::amount::{AmountError, Coins};
use crate::store::StoreError;

/// Errors returned by [`WalletLedger`](super::WalletLedger) operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("wallet not found: {0}")]
    NotFound(String),

    #[error("wallet already exists: {0}")]
    AlreadyExists(String),

    #[error("insufficient funds in wallet {wallet}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        wallet: String,
        balance: Coins,
        requested: Coins,
    },

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

impl From<AmountError> for LedgerError {
    fn from(err: AmountError) -> Self {
        LedgerError::InvalidArgument(err.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
