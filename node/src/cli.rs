//! # CLI Interface
//!
//! Defines the command-line argument structure for `loyalty-node` using
//! `clap` derive. Supports four subcommands: `run`, `init`, `status`,
//! and `version`. Every `run` option can also come from a `LOYALTY_*`
//! environment variable.

use clap::{Parser, Subcommand};
use loyalty_ledger::config::{
    DEFAULT_METRICS_PORT, DEFAULT_RESET_INTERVAL, DEFAULT_RESET_UNIT, DEFAULT_RPC_PORT,
};
use loyalty_ledger::Coins;
use std::path::PathBuf;

/// Loyalty coin ledger node.
///
/// Hosts the wallet ledger and the merchant adapters, serves the JSON-RPC
/// and REST API, streams ledger events over WebSocket, resets spend limits
/// on a schedule and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "loyalty-node",
    about = "Loyalty coin ledger node",
    version,
    propagate_version = true
)]
pub struct LoyaltyNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Create the data directory and seed the coin supply.
    Init(InitArgs),
    /// Query the status of a running node via its API.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Directory holding the ledger database and one database per merchant.
    ///
    /// Created on first run if it does not exist.
    #[arg(long, short = 'd', env = "LOYALTY_DATA_DIR", default_value = "./loyalty-data")]
    pub data_dir: PathBuf,

    /// Port for the JSON-RPC and REST API.
    #[arg(long, env = "LOYALTY_RPC_PORT", default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "LOYALTY_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Coin supply to seed when the ledger has none yet. Ignored otherwise.
    #[arg(long, env = "LOYALTY_INITIAL_SUPPLY")]
    pub initial_supply: Option<Coins>,

    /// How many units between limit resets.
    #[arg(long, env = "LOYALTY_RESET_EVERY", default_value_t = DEFAULT_RESET_INTERVAL)]
    pub reset_every: u32,

    /// Unit of the limit-reset period: seconds, minutes, hours, days or weeks.
    #[arg(long, env = "LOYALTY_RESET_UNIT", default_value = DEFAULT_RESET_UNIT)]
    pub reset_unit: String,

    /// Wall-clock `HH:MM` (UTC) of the reset. Days and weeks only; defaults
    /// to midnight for those units.
    #[arg(long, env = "LOYALTY_RESET_AT")]
    pub reset_at: Option<String>,

    /// Coins earned per currency unit at the supermarket.
    #[arg(long, env = "LOYALTY_SUPERMARKET_RATE")]
    pub supermarket_rate: Option<Coins>,

    /// Pool drawn from the supply for every merchant that is not open yet.
    ///
    /// When omitted, unopened merchants stay closed and refuse purchases.
    #[arg(long, env = "LOYALTY_MERCHANT_POOL")]
    pub merchant_pool: Option<Coins>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, env = "LOYALTY_LOG_FORMAT", default_value = "pretty")]
    pub log_format: String,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "LOYALTY_DATA_DIR", default_value = "./loyalty-data")]
    pub data_dir: PathBuf,

    /// Coin supply to seed. Overwrites an existing counter.
    #[arg(long, env = "LOYALTY_INITIAL_SUPPLY", default_value = "1000000")]
    pub initial_supply: Coins,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// `host:port` of the running node's API.
    #[arg(long, default_value = "127.0.0.1:9841")]
    pub rpc_addr: String,
}
