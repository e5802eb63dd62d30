//! Notifications published by the ledger.
//!
//! Delivery is best-effort: events go out on a broadcast channel and are
//! dropped when nobody listens or a subscriber lags.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::amount::Coins;

use super::movement::MovementKind;

/// A ledger notification. Serialized with the wire names external listeners
/// subscribe to (`createWallet`, `debitEvent`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum LedgerEvent {
    #[serde(rename = "createWallet")]
    WalletCreated { id: Uuid, wallet_id: String },

    #[serde(rename = "debitEvent")]
    BalanceChanged {
        id: Uuid,
        wallet_id: String,
        business: String,
        kind: MovementKind,
        amount: Coins,
        balance: Coins,
    },
}

impl LedgerEvent {
    pub(crate) fn wallet_created(wallet_id: &str) -> Self {
        LedgerEvent::WalletCreated {
            id: Uuid::new_v4(),
            wallet_id: wallet_id.to_string(),
        }
    }

    pub(crate) fn balance_changed(
        wallet_id: &str,
        business: &str,
        kind: MovementKind,
        amount: Coins,
        balance: Coins,
    ) -> Self {
        LedgerEvent::BalanceChanged {
            id: Uuid::new_v4(),
            wallet_id: wallet_id.to_string(),
            business: business.to_string(),
            kind,
            amount,
            balance,
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::WalletCreated { .. } => "createWallet",
            LedgerEvent::BalanceChanged { .. } => "debitEvent",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            LedgerEvent::WalletCreated { id, .. } | LedgerEvent::BalanceChanged { id, .. } => *id,
        }
    }

    pub fn wallet_id(&self) -> &str {
        match self {
            LedgerEvent::WalletCreated { wallet_id, .. }
            | LedgerEvent::BalanceChanged { wallet_id, .. } => wallet_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_name() {
        let event = LedgerEvent::wallet_created("w1");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "createWallet");
        assert_eq!(json["data"]["wallet_id"], "w1");
        assert_eq!(event.name(), "createWallet");
    }

    #[test]
    fn balance_change_is_debit_event() {
        let event = LedgerEvent::balance_changed(
            "w1",
            "cineplanet",
            MovementKind::Credit,
            Coins::from_int(5),
            Coins::from_int(5),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "debitEvent");
        assert_eq!(json["data"]["kind"], "C");
        assert_eq!(json["data"]["amount"], "5.000000");
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(
            LedgerEvent::wallet_created("w1").id(),
            LedgerEvent::wallet_created("w1").id()
        );
    }
}
