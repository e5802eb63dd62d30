// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Loyalty Merchants
//!
//! Merchant adapters for the loyalty coin platform. A merchant never owns
//! customer balances: it converts purchases into ledger calls through a
//! [`LedgerClient`](loyalty_ledger::LedgerClient) and keeps only its own
//! bookkeeping.
//!
//! - **Profiles**: cinema (rate 1), pharmacy (rate 3) and supermarket
//!   (configurable rate), where the rate is coins earned per currency unit.
//! - **Coin pool**: the slice of the global supply a merchant may still hand
//!   out, drawn from the ledger when the merchant opens.
//! - **Exchange journal**: one row per coin delivery or redemption.
//!
//! ## Design Principles
//!
//! 1. A purchase is validated in full (pool, customer balance) before the
//!    first ledger call.
//! 2. Amounts are `Coins`, never floats.
//! 3. Merchant state lives in its own store, separate from the ledger's.

pub mod error;
pub mod merchant;
pub mod pool;
pub mod profile;

pub use error::{MerchantError, MerchantResult};
pub use merchant::{Merchant, Purchase};
pub use pool::{ExchangeKind, ExchangeRecord, MerchantPool};
pub use profile::MerchantProfile;

/// Table holding each merchant's exchange journal.
pub const EXCHANGE_TABLE: &str = "Canjes";
