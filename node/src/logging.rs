//! # Logging
//!
//! `tracing` setup for the node binary. Everything goes to stderr; stdout
//! carries only what `status` and `version` print.
//!
//! `RUST_LOG` replaces the profile's filter when set:
//!
//! ```text
//! RUST_LOG=loyalty_ledger=debug,loyalty_merchants=debug
//! ```

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Which subcommand is logging, and therefore how much.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogProfile {
    /// The long-running `run` node, HTTP traces included.
    Serve,
    /// One-shot maintenance such as `init`.
    Maintenance,
}

impl LogProfile {
    pub fn filter(self) -> &'static str {
        match self {
            LogProfile::Serve => {
                "loyalty_node=info,loyalty_ledger=info,loyalty_merchants=info,tower_http=debug"
            }
            LogProfile::Maintenance => "loyalty_node=info,loyalty_ledger=info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    /// One JSON object per event, fields flattened to the top level.
    Json,
}

impl LogFormat {
    /// `json` in any case selects [`LogFormat::Json`]; anything else is pretty.
    pub fn from_str_lossy(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init_logging(profile: LogProfile, format: LogFormat) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(profile.filter()));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(profile == LogProfile::Serve),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
}
