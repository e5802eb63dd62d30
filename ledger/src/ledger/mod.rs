//! # Ledger Module
//!
//! Wallets, the global coin supply and the movement journal.
//!
//! ## Architecture
//!
//! ```text
//! wallet.rs   - Wallet record, NewWallet parameters, balance index rows
//! movement.rs - Journal rows (C/D/W) and restartable journal scans
//! supply.rs   - The coinBalance counter
//! events.rs   - createWallet / debitEvent notifications
//! service.rs  - WalletLedger: every operation that reads or mutates the above
//! error.rs    - LedgerError
//! ```
//!
//! ## Storage Layout
//!
//! | Where                 | Key                              | Value                 |
//! |-----------------------|----------------------------------|-----------------------|
//! | state                 | wallet id                        | `json(Wallet)`        |
//! | state                 | `coinBalance`                    | decimal string        |
//! | `Movimientos` table   | `("Movement", wallet, time)`     | business, amount, balance, kind |
//! | `Wallet` table        | `("Wallet", wallet)`             | balance               |

mod error;
mod events;
mod movement;
mod service;
mod supply;
mod wallet;

pub use error::{LedgerError, LedgerResult};
pub use events::LedgerEvent;
pub use movement::{Movement, MovementIter, MovementKind, Movements};
pub use service::WalletLedger;
pub use wallet::{NewWallet, Wallet, WalletBalance};
