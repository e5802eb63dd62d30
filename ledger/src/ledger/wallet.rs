//! Wallet records and the balance index row.

use serde::{Deserialize, Serialize};

use crate::amount::Coins;
use crate::config::{DEFAULT_WALLET_LIMIT, WALLET_TAG};
use crate::store::{Column, Row};

use super::error::{LedgerError, LedgerResult};

/// A customer wallet, stored as JSON under its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: String,
    pub email: String,
    pub phone: String,
    pub document: String,
    /// Coin balance.
    pub amount: Coins,
    /// Remaining spend allowance in the current reset period.
    pub limit: Coins,
    /// What `limit` is restored to on reset.
    pub limit_ceiling: Coins,
    /// Creation time, milliseconds since the epoch.
    pub created_at: i64,
}

impl Wallet {
    pub(crate) fn to_bytes(&self) -> LedgerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            LedgerError::Storage(crate::store::StoreError::Serialization(e.to_string()))
        })
    }

    pub(crate) fn from_bytes(key: &str, bytes: &[u8]) -> LedgerResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| LedgerError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// The `Wallet` table row mirroring this wallet's balance.
    pub(crate) fn index_row(&self) -> Row {
        Row::new(
            vec![Column::str(WALLET_TAG), Column::str(&self.id)],
            vec![Column::str(self.amount.to_string())],
        )
    }
}

/// Parameters for [`WalletLedger::create_wallet`](super::WalletLedger::create_wallet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWallet {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub document: String,
    #[serde(default = "default_limit")]
    pub initial_limit: Coins,
}

fn default_limit() -> Coins {
    Coins::from_int(DEFAULT_WALLET_LIMIT)
}

impl NewWallet {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: String::new(),
            phone: String::new(),
            document: String::new(),
            initial_limit: default_limit(),
        }
    }

    pub fn contact(
        mut self,
        email: impl Into<String>,
        phone: impl Into<String>,
        document: impl Into<String>,
    ) -> Self {
        self.email = email.into();
        self.phone = phone.into();
        self.document = document.into();
        self
    }

    pub fn limit(mut self, limit: Coins) -> Self {
        self.initial_limit = limit;
        self
    }
}

/// One entry of the wallet listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    #[serde(rename = "walletid")]
    pub wallet_id: String,
    pub balance: Coins,
}

impl WalletBalance {
    pub(crate) fn from_row(row: &Row) -> LedgerResult<Self> {
        let corrupt = |reason: &str| LedgerError::Corrupt {
            key: format!("{:?}", row.key),
            reason: reason.to_string(),
        };
        let wallet_id = row.key_str(1).ok_or_else(|| corrupt("missing wallet id"))?;
        let balance = row
            .value_str(0)
            .ok_or_else(|| corrupt("missing balance"))?
            .parse::<Coins>()
            .map_err(|e| corrupt(&e.to_string()))?;
        Ok(Self {
            wallet_id: wallet_id.to_string(),
            balance,
        })
    }
}
