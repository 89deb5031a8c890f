//! Logging initialization for the CLI.
//!
//! Logging is owned by the binary; the library only emits `tracing` events.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `debug` raises wisper's own targets from INFO to DEBUG. `RUST_LOG`, when
/// set, replaces the default filter entirely.
pub fn init(debug: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,wisper={level},wisper_core={level}")));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(debug)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .try_init();
}
