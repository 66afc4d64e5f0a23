// Log output for hosts embedding the downloader

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install a fmt subscriber.
///
/// `RUST_LOG` wins over `default_filter` (e.g. "info" or "media_downloader=debug").
/// Returns false when a global subscriber was already set.
pub fn init_logging(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .try_init()
        .is_ok()
}
