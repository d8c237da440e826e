//! Tracing initialization

use std::sync::Once;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "STATEMENT_ENGINE_LOG";

static INIT: Once = Once::new();

/// Fallback filter used when `STATEMENT_ENGINE_LOG` is unset or invalid
pub fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "bank_statement_engine=debug"
    } else {
        "bank_statement_engine=info"
    }
}

/// Initialize logging to stderr
///
/// Reads `STATEMENT_ENGINE_LOG` for the filter, e.g.
/// `STATEMENT_ENGINE_LOG=bank_statement_engine::core=debug,warn`.
/// Idempotent; only the first call installs a subscriber.
pub fn init_tracing(verbose: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(LOG_ENV)
            .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(verbose)
                    .with_thread_ids(verbose),
            )
            .with(filter)
            .init();
    });
}
