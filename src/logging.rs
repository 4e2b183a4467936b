//! Tracing setup.
//!
//! Logs go to stderr so `--json` output on stdout stays machine-readable.
//! `RUST_LOG` overrides the default filter.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_FILTER: &str = "nc_analyzer=info,nc_analyzer_core=info,tower_http=info";

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
