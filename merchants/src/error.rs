use loyalty_ledger::{Coins, GatewayError, StoreError};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by merchant operations.
#[derive(Debug, Error)]
pub enum MerchantError {
    /// The ledger rejected or failed a call.
    #[error("ledger call failed: {0}")]
    Client(#[from] GatewayError),

    /// The customer does not hold the coins they want to redeem.
    #[error("wallet {wallet} holds {balance} coins, cannot redeem {requested}")]
    InsufficientFunds {
        wallet: String,
        balance: Coins,
        requested: Coins,
    },

    /// The merchant cannot issue that many coins.
    #[error("coin pool has {available} left, purchase would issue {requested}")]
    InsufficientPool { available: Coins, requested: Coins },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The merchant has no coin pool yet.
    #[error("merchant {0} is not open")]
    NotOpen(String),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// A ledger response or stored record could not be decoded.
    #[error("cannot decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },
}

pub type MerchantResult<T> = Result<T, MerchantError>;
