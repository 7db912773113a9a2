//! Diagnostics go to stderr so the report on stdout stays machine-readable.
//!
//! `RUST_LOG` overrides the filter. Without it the crate logs at `info`, or
//! `debug` with `--verbose`, which also surfaces per-section classification
//! counts. `RUST_LOG_FORMAT=json` emits one JSON object per event for
//! batch runs over many tickers.

use tracing_subscriber::EnvFilter;

const CRATE: &str = "earnings_signals";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn from_env() -> Self {
        match std::env::var("RUST_LOG_FORMAT") {
            Ok(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Text,
        }
    }
}

fn default_directive(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    format!("{CRATE}={level}")
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    // one crate, so the target adds nothing in text mode
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(format == LogFormat::Json);

    match format {
        LogFormat::Json => {
            let _ = subscriber.json().try_init();
        }
        LogFormat::Text => {
            let _ = subscriber.compact().try_init();
        }
    }
}
