//! Console logging setup
//!
//! Node events are emitted as `tracing` events carrying a short `tag`
//! field (`TXOK`, `RPT`, `FWD`, ...) so logs can be filtered by event kind.

use std::io;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::{Error, Result};

/// Builds the level filter; `RUST_LOG` takes precedence when set
pub fn filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs the global subscriber writing to stderr
///
/// Fails if a global subscriber is already installed.
pub fn init(verbose: bool) -> Result<()> {
    tracing_subscriber::registry()
        .with(filter(verbose))
        .with(
            fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_level(true)
                .with_thread_ids(false),
        )
        .try_init()
        .map_err(|e| Error::invalid_state(format!("Failed to install logger: {}", e)))
}
