// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Loyalty Node
//!
//! Entry point for the `loyalty-node` binary. Parses CLI arguments,
//! initializes logging and metrics, opens the ledger and merchant databases,
//! starts the limit-reset scheduler, and serves the HTTP/WS API.
//!
//! The binary supports four subcommands:
//!
//! - `run`     - start the node
//! - `init`    - create the data directory and seed the coin supply
//! - `status`  - query a running node's status endpoint
//! - `version` - print build version information
//!
//! ## Data Directory
//!
//! ```text
//! <data_dir>/ledger               wallets, journal, coin supply
//! <data_dir>/merchants/<name>     one pool and exchange journal per merchant
//! ```

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use loyalty_ledger::config::{COIN_BALANCE_KEY, DEFAULT_RESET_AT};
use loyalty_ledger::scheduler::Unit;
use loyalty_ledger::{Gateway, LedgerDb, Scheduler, StateStore, WalletLedger};
use loyalty_merchants::{Merchant, MerchantProfile};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use api::NodeMerchant;
use cli::{Commands, LoyaltyNodeCli};
use logging::{LogFormat, LogProfile};
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = LoyaltyNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the full node: ledger, merchants, scheduler, API server and
/// metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(LogProfile::Serve, LogFormat::from_str_lossy(&args.log_format))
        .context("failed to install log subscriber")?;

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting loyalty-node"
    );

    // --- Ledger ---
    let ledger = Arc::new(WalletLedger::new(Arc::new(open_db(&args.data_dir.join("ledger"))?)));
    if let Some(supply) = args.initial_supply {
        if ledger.store().get(COIN_BALANCE_KEY)?.is_none() {
            ledger
                .init_total_coin(supply)
                .context("failed to seed the coin supply")?;
        } else {
            tracing::info!("coin supply already present, --initial-supply ignored");
        }
    }
    let gateway = Gateway::new(Arc::clone(&ledger));

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    node_metrics.observe_supply(ledger.total_coin()?);
    let event_tracker = tokio::spawn(metrics::track_events(
        ledger.subscribe(),
        Arc::clone(&node_metrics),
    ));

    // --- Merchants ---
    let merchants = open_merchants(&args, &gateway)?;

    // --- Limit-reset scheduler ---
    let (scheduler, reset_schedule) = build_scheduler(&args, &ledger, &node_metrics)?;
    let scheduler_handle = scheduler.start();

    // --- Application state ---
    let app_state = api::AppState {
        version: env!("CARGO_PKG_VERSION").to_string(),
        started_at: chrono::Utc::now(),
        gateway,
        merchants: Arc::new(merchants),
        reset_schedule,
        metrics: Arc::clone(&node_metrics),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    match scheduler_handle.stop().await {
        Ok(scheduler) => tracing::info!(jobs = scheduler.len(), "scheduler stopped"),
        Err(e) => tracing::error!("scheduler task failed: {}", e),
    }
    event_tracker.abort();
    ledger.store().flush().context("failed to flush ledger database")?;

    tracing::info!("loyalty-node stopped");
    Ok(())
}

fn open_db(path: &Path) -> Result<LedgerDb> {
    std::fs::create_dir_all(path)
        .with_context(|| format!("failed to create database directory: {}", path.display()))?;
    let db = LedgerDb::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    tracing::info!(path = %path.display(), "database opened");
    Ok(db)
}

/// Opens every built-in merchant over its own database, drawing the
/// configured pool for those not yet open.
fn open_merchants(
    args: &cli::RunArgs,
    gateway: &Gateway<LedgerDb>,
) -> Result<BTreeMap<String, Arc<NodeMerchant>>> {
    let supermarket = MerchantProfile::supermarket(args.supermarket_rate.map(|r| r.as_decimal()))
        .context("invalid supermarket rate")?;
    let profiles = [MerchantProfile::cinema(), MerchantProfile::pharmacy(), supermarket];

    let mut merchants = BTreeMap::new();
    for profile in profiles {
        let name = profile.name.clone();
        let db = open_db(&args.data_dir.join("merchants").join(&name))?;
        let merchant = Merchant::new(profile, gateway.clone(), db);

        if !merchant.is_open()? {
            match args.merchant_pool {
                Some(pool) => {
                    merchant
                        .open(pool)
                        .with_context(|| format!("failed to open merchant {}", name))?;
                }
                None => tracing::warn!(merchant = %name, "merchant has no coin pool and stays closed"),
            }
        }
        merchants.insert(name, Arc::new(merchant));
    }
    Ok(merchants)
}

/// Registers the limit-reset job. Returns the scheduler and a description
/// of the cadence.
fn build_scheduler(
    args: &cli::RunArgs,
    ledger: &Arc<WalletLedger<LedgerDb>>,
    node_metrics: &Arc<NodeMetrics>,
) -> Result<(Scheduler, String)> {
    let unit: Unit = args.reset_unit.parse().context("invalid --reset-unit")?;
    let at = match (&args.reset_at, unit) {
        (Some(at), _) => Some(at.clone()),
        (None, Unit::Days | Unit::Weeks) => Some(DEFAULT_RESET_AT.to_string()),
        (None, _) => None,
    };

    let mut scheduler = Scheduler::new();
    let mut job = scheduler.every(args.reset_every).unit(unit);
    if let Some(at) = &at {
        job = job.at(at);
    }

    let reset_ledger = Arc::clone(ledger);
    let reset_metrics = Arc::clone(node_metrics);
    job.run(move || {
        let changed = reset_ledger.reset_limits()?;
        reset_metrics.limit_resets_total.inc();
        reset_metrics.wallets_reset_total.inc_by(changed as u64);
        Ok(())
    })
    .context("invalid limit-reset schedule")?;

    let schedule = match at {
        Some(at) => format!("every {} {} at {}", args.reset_every, unit, at),
        None => format!("every {} {}", args.reset_every, unit),
    };
    tracing::info!(schedule = %schedule, "limit reset scheduled");
    Ok((scheduler, schedule))
}

/// Creates the data directory and seeds the coin supply.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging(LogProfile::Maintenance, LogFormat::Pretty)
        .context("failed to install log subscriber")?;

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    let ledger = WalletLedger::new(Arc::new(open_db(&data_dir.join("ledger"))?));
    ledger
        .init_total_coin(args.initial_supply)
        .context("failed to seed the coin supply")?;
    ledger.store().flush().context("failed to flush ledger database")?;

    std::fs::create_dir_all(data_dir.join("merchants"))
        .with_context(|| format!("failed to create merchants directory under {}", data_dir.display()))?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Coin supply    : {}", args.initial_supply);

    Ok(())
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let body = http_get(&args.rpc_addr, "/status").await?;
    println!("{}", body);
    Ok(())
}

/// Minimal HTTP/1.1 GET over a plain TCP stream.
async fn http_get(addr: &str, path: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let host = addr.rsplit_once(':').map(|(h, _)| h).unwrap_or(addr);
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        path, host,
    );
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());
    Ok(body)
}

/// Prints version information to stdout.
fn print_version() {
    println!("loyalty-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc        {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. A handler that cannot
/// be installed never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
