//! # Ledger Configuration & Constants
//!
//! Every magic number the ledger relies on lives here. Storage keys and table
//! tags are part of the on-disk contract: merchant modules and external
//! readers scan by these names, so renaming one is a migration.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Storage Keys & Tables
// ---------------------------------------------------------------------------

/// State key of the global coin-supply counter.
pub const COIN_BALANCE_KEY: &str = "coinBalance";

/// Table holding the movement journal.
pub const MOVEMENT_TABLE: &str = "Movimientos";

/// First key column of every movement row. Scans filter on it.
pub const MOVEMENT_TAG: &str = "Movement";

/// Table holding the `(wallet, balance)` index used by listings.
pub const WALLET_TABLE: &str = "Wallet";

/// First key column of every wallet index row.
pub const WALLET_TAG: &str = "Wallet";

/// Business name recorded on the movement written at wallet creation.
pub const CREATE_BUSINESS: &str = "Create";

// ---------------------------------------------------------------------------
// Wallet Parameters
// ---------------------------------------------------------------------------

/// Spend allowance a new wallet starts with, and the ceiling limit resets
/// restore it to.
pub const DEFAULT_WALLET_LIMIT: i64 = 100;

/// Fractional digits carried by every amount on the wire and at rest.
pub const AMOUNT_DECIMALS: u32 = 6;

/// How many times a journal append retries with a bumped timestamp when the
/// `(wallet, time)` key is already taken.
pub const MAX_JOURNAL_KEY_RETRIES: i64 = 16;

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Period of the scheduler's driving timer.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Default limit-reset cadence: once a day at midnight.
pub const DEFAULT_RESET_INTERVAL: u32 = 1;
pub const DEFAULT_RESET_UNIT: &str = "days";
pub const DEFAULT_RESET_AT: &str = "00:00";

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Default port for the JSON-RPC and REST API.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default port for the Prometheus endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

/// Capacity of the ledger's notification channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
