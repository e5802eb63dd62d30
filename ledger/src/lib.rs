// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Loyalty Ledger: Core Library
//!
//! The shared wallet ledger behind the loyalty coin platform. Merchants
//! (cinema, pharmacy, supermarket) never touch balances directly: they call
//! into this ledger, which owns every wallet, the global coin supply and the
//! movement journal.
//!
//! ## Architecture
//!
//! - **config** - Constants: storage keys, default limits, wire precision.
//! - **amount** - `Coins`, a fixed-precision decimal amount.
//! - **clock** - Injectable wall clock so time-dependent code is testable.
//! - **store** - The key-value/row-table contract plus in-memory and sled
//!   implementations.
//! - **ledger** - Wallets, coin supply, movements and the operations that
//!   mutate them.
//! - **gateway** - String-argument function dispatch used by merchant
//!   modules (`createwallet`, `putbalance`, `getbalance`, ...).
//! - **scheduler** - Tick-driven recurring jobs (limit resets).
//!
//! ## Design Philosophy
//!
//! 1. One canonical ledger. Merchants are thin clients.
//! 2. No hidden globals: the store, the clock and the scheduler are values
//!    you construct and pass around.
//! 3. If it touches coins, it has tests.

pub mod amount;
pub mod clock;
pub mod config;
pub mod gateway;
pub mod ledger;
pub mod scheduler;
pub mod store;

pub use amount::Coins;
pub use clock::{Clock, ManualClock, SystemClock};
pub use gateway::{Gateway, GatewayError, LedgerClient};
pub use ledger::{
    LedgerError, LedgerEvent, LedgerResult, Movement, MovementKind, NewWallet, Wallet, WalletBalance,
    WalletLedger,
};
pub use scheduler::{Scheduler, SchedulerError, SchedulerHandle};
pub use store::{LedgerDb, MemoryStore, StateStore, StoreError};
