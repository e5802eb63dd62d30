//! # Prometheus Metrics
//!
//! Exposes operational metrics for the node. Scraped by Prometheus at the
//! `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so they
//! do not collide with any default global registry consumers.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use loyalty_ledger::{Coins, LedgerEvent};
use prometheus::core::Collector;
use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Holds all Prometheus metric handles for the node.
///
/// Clone-friendly (prometheus handles are reference-counted) so it can be
/// shared across request handlers, the scheduler task and the event tracker.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// JSON-RPC calls, labelled by gateway function.
    pub rpc_calls_total: IntCounterVec,
    /// JSON-RPC calls that returned an error object.
    pub rpc_errors_total: IntCounter,
    /// Histogram of JSON-RPC handling latency in seconds.
    pub rpc_latency_seconds: Histogram,
    pub wallets_created_total: IntCounter,
    /// Balance-changing ledger events (credits and debits).
    pub balance_changes_total: IntCounter,
    pub purchases_total: IntCounter,
    /// Limit-reset job runs.
    pub limit_resets_total: IntCounter,
    /// Wallets whose limit a reset actually restored.
    pub wallets_reset_total: IntCounter,
    /// Last observed global coin supply.
    pub coin_supply: Gauge,
    /// Open WebSocket subscribers.
    pub ws_subscribers: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("loyalty".into()), None)?;

        let rpc_calls_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("rpc_calls_total", "Total number of JSON-RPC calls"),
                &["function"],
            )?,
        )?;
        let rpc_errors_total = register(
            &registry,
            IntCounter::new("rpc_errors_total", "JSON-RPC calls answered with an error")?,
        )?;
        let rpc_latency_seconds = register(
            &registry,
            Histogram::with_opts(
                HistogramOpts::new(
                    "rpc_latency_seconds",
                    "JSON-RPC request handling latency in seconds",
                )
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]),
            )?,
        )?;
        let wallets_created_total = register(
            &registry,
            IntCounter::new("wallets_created_total", "Wallets created since startup")?,
        )?;
        let balance_changes_total = register(
            &registry,
            IntCounter::new(
                "balance_changes_total",
                "Wallet credits and debits since startup",
            )?,
        )?;
        let purchases_total = register(
            &registry,
            IntCounter::new("purchases_total", "Merchant purchases recorded")?,
        )?;
        let limit_resets_total = register(
            &registry,
            IntCounter::new("limit_resets_total", "Runs of the limit-reset job")?,
        )?;
        let wallets_reset_total = register(
            &registry,
            IntCounter::new(
                "wallets_reset_total",
                "Wallets whose spend limit a reset restored",
            )?,
        )?;
        let coin_supply = register(
            &registry,
            Gauge::new("coin_supply", "Last observed global coin supply")?,
        )?;
        let ws_subscribers = register(
            &registry,
            IntGauge::new("ws_subscribers", "Connected WebSocket event subscribers")?,
        )?;

        Ok(Self {
            registry,
            rpc_calls_total,
            rpc_errors_total,
            rpc_latency_seconds,
            wallets_created_total,
            balance_changes_total,
            purchases_total,
            limit_resets_total,
            wallets_reset_total,
            coin_supply,
            ws_subscribers,
        })
    }

    /// Records a supply reading. The gauge is lossy above `f64` precision.
    pub fn observe_supply(&self, supply: Coins) {
        if let Ok(value) = supply.to_string().parse::<f64>() {
            self.coin_supply.set(value);
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

fn register<M>(registry: &Registry, metric: M) -> Result<M, prometheus::Error>
where
    M: Collector + Clone + 'static,
{
    registry.register(Box::new(metric.clone()))?;
    Ok(metric)
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
///
/// Returns HTTP 500 if encoding fails.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}

/// Counts ledger notifications until the channel closes.
pub async fn track_events(mut rx: broadcast::Receiver<LedgerEvent>, metrics: SharedMetrics) {
    loop {
        match rx.recv().await {
            Ok(LedgerEvent::WalletCreated { .. }) => metrics.wallets_created_total.inc(),
            Ok(LedgerEvent::BalanceChanged { .. }) => metrics.balance_changes_total.inc(),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(missed = n, "metrics event tracker lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_with_namespace() {
        let metrics = NodeMetrics::new().unwrap();
        metrics.rpc_calls_total.with_label_values(&["getbalance"]).inc();
        metrics.observe_supply(Coins::from_int(9000));

        let text = metrics.encode().unwrap();
        assert!(text.contains("loyalty_rpc_calls_total{function=\"getbalance\"} 1"));
        assert!(text.contains("loyalty_coin_supply 9000"));
    }

    #[tokio::test]
    async fn tracker_counts_events() {
        let metrics = Arc::new(NodeMetrics::new().unwrap());
        let (tx, rx) = broadcast::channel(8);
        let task = tokio::spawn(track_events(rx, Arc::clone(&metrics)));

        tx.send(LedgerEvent::WalletCreated {
            id: Default::default(),
            wallet_id: "w1".into(),
        })
        .unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(metrics.wallets_created_total.get(), 1);
        assert_eq!(metrics.balance_changes_total.get(), 0);
    }
}
