//! The movement journal.
//!
//! Each balance change appends one immutable row to the `Movimientos` table,
//! keyed `("Movement", wallet, time)`. Because the key encoding preserves
//! integer order, a per-wallet scan yields movements oldest first.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::amount::Coins;
use crate::config::{MOVEMENT_TABLE, MOVEMENT_TAG};
use crate::store::{Column, Row, StateStore};

use super::error::{LedgerError, LedgerResult};

/// What a movement did to the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MovementKind {
    #[serde(rename = "C")]
    Credit,
    #[serde(rename = "D")]
    Debit,
    /// Wallet creation marker.
    #[serde(rename = "W")]
    Wallet,
}

impl MovementKind {
    pub fn code(&self) -> &'static str {
        match self {
            MovementKind::Credit => "C",
            MovementKind::Debit => "D",
            MovementKind::Wallet => "W",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "C" => Some(MovementKind::Credit),
            "D" => Some(MovementKind::Debit),
            "W" => Some(MovementKind::Wallet),
            _ => None,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Movement {
    /// Milliseconds since the epoch. Unique per wallet.
    pub time: i64,
    #[serde(rename = "walletid")]
    pub wallet_id: String,
    /// Merchant name, counterparty wallet, or `Create`.
    pub business: String,
    pub amount: Coins,
    /// Wallet balance right after this movement.
    pub balance: Coins,
    #[serde(rename = "type")]
    pub kind: MovementKind,
}

impl Movement {
    pub(crate) fn to_row(&self) -> Row {
        Row::new(
            vec![
                Column::str(MOVEMENT_TAG),
                Column::str(&self.wallet_id),
                Column::Int(self.time),
            ],
            vec![
                Column::str(&self.business),
                Column::str(self.amount.to_string()),
                Column::str(self.balance.to_string()),
                Column::str(self.kind.code()),
            ],
        )
    }

    pub(crate) fn from_row(row: &Row) -> LedgerResult<Self> {
        let corrupt = |reason: String| LedgerError::Corrupt {
            key: format!("{:?}", row.key),
            reason,
        };
        let missing = |what: &str| corrupt(format!("missing {what}"));

        let wallet_id = row.key_str(1).ok_or_else(|| missing("wallet id"))?;
        let time = row.key_int(2).ok_or_else(|| missing("time"))?;
        let business = row.value_str(0).ok_or_else(|| missing("business"))?;
        let amount = row
            .value_str(1)
            .ok_or_else(|| missing("amount"))?
            .parse::<Coins>()
            .map_err(|e| corrupt(e.to_string()))?;
        let balance = row
            .value_str(2)
            .ok_or_else(|| missing("balance"))?
            .parse::<Coins>()
            .map_err(|e| corrupt(e.to_string()))?;
        let code = row.value_str(3).ok_or_else(|| missing("kind"))?;
        let kind = MovementKind::from_code(code)
            .ok_or_else(|| corrupt(format!("unknown movement kind {code:?}")))?;

        Ok(Self {
            time,
            wallet_id: wallet_id.to_string(),
            business: business.to_string(),
            amount,
            balance,
            kind,
        })
    }
}

/// Boxed stream of decoded movements.
pub type MovementIter<'a> = Box<dyn Iterator<Item = LedgerResult<Movement>> + 'a>;

/// A restartable view over the journal.
///
/// Nothing is read until [`iter`](Movements::iter) is called, and every call
/// starts a fresh scan, so the same query can be replayed.
pub struct Movements<'a, S: StateStore> {
    store: &'a S,
    wallet: Option<String>,
}

impl<'a, S: StateStore> Movements<'a, S> {
    pub(crate) fn new(store: &'a S, wallet: Option<&str>) -> Self {
        Self {
            store,
            wallet: wallet.map(str::to_string),
        }
    }

    pub fn iter(&self) -> LedgerResult<MovementIter<'a>> {
        let mut prefix = vec![Column::str(MOVEMENT_TAG)];
        if let Some(wallet) = &self.wallet {
            prefix.push(Column::str(wallet));
        }
        let rows = self.store.scan(MOVEMENT_TABLE, &prefix)?;
        Ok(Box::new(rows.map(|row| -> LedgerResult<Movement> {
            Movement::from_row(&row?)
        })))
    }

    /// Drains a fresh scan into a vector.
    pub fn collect_vec(&self) -> LedgerResult<Vec<Movement>> {
        self.iter()?.collect()
    }
}
