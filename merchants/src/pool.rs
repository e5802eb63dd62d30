//! # Merchant Bookkeeping
//!
//! The coin pool and the exchange journal, both kept in the merchant's own
//! [`StateStore`].
//!
//! | Where            | Key                    | Value          |
//! |------------------|------------------------|----------------|
//! | state            | `coinBalance`          | `json(MerchantPool)` |
//! | `Canjes` table   | `(business, time)`     | amount, kind   |

use loyalty_ledger::store::{Column, Row};
use loyalty_ledger::Coins;
use serde::{Deserialize, Serialize};

use crate::error::{MerchantError, MerchantResult};

/// How many coins a merchant may still issue, and what it has done so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchantPool {
    pub business: String,
    /// Coins still available to issue.
    pub total: Coins,
    /// Coins customers redeemed here.
    pub exchanged: Coins,
    /// Coins issued to customers.
    pub sent: Coins,
}

impl MerchantPool {
    pub fn new(business: impl Into<String>, total: Coins) -> Self {
        Self {
            business: business.into(),
            total,
            exchanged: Coins::ZERO,
            sent: Coins::ZERO,
        }
    }

    pub(crate) fn to_bytes(&self) -> MerchantResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MerchantError::Decode {
            what: "merchant pool",
            reason: e.to_string(),
        })
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> MerchantResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| MerchantError::Decode {
            what: "merchant pool",
            reason: e.to_string(),
        })
    }
}

/// Direction of a coin exchange, seen from the merchant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeKind {
    /// Coins came back from a customer (redemption).
    #[serde(rename = "C")]
    Returned,
    /// Coins were delivered to a customer (earned on a purchase).
    #[serde(rename = "D")]
    Delivered,
}

impl ExchangeKind {
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeKind::Returned => "C",
            ExchangeKind::Delivered => "D",
        }
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "C" => Some(ExchangeKind::Returned),
            "D" => Some(ExchangeKind::Delivered),
            _ => None,
        }
    }
}

/// One row of the exchange journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub business: String,
    pub time: i64,
    pub amount: Coins,
    #[serde(rename = "type")]
    pub kind: ExchangeKind,
}

impl ExchangeRecord {
    pub(crate) fn to_row(&self) -> Row {
        Row::new(
            vec![Column::str(&self.business), Column::Int(self.time)],
            vec![
                Column::str(self.amount.to_string()),
                Column::str(self.kind.code()),
            ],
        )
    }

    pub(crate) fn from_row(row: &Row) -> MerchantResult<Self> {
        let bad = |reason: &str| MerchantError::Decode {
            what: "exchange record",
            reason: reason.to_string(),
        };
        let business = row.key_str(0).ok_or_else(|| bad("missing business"))?;
        let time = row.key_int(1).ok_or_else(|| bad("missing time"))?;
        let amount = row
            .value_str(0)
            .ok_or_else(|| bad("missing amount"))?
            .parse::<Coins>()
            .map_err(|e| bad(&e.to_string()))?;
        let kind = row
            .value_str(1)
            .and_then(ExchangeKind::from_code)
            .ok_or_else(|| bad("missing or unknown kind"))?;
        Ok(Self {
            business: business.to_string(),
            time,
            amount,
            kind,
        })
    }
}
