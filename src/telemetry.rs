//! Console logging setup.

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered at `level`.
///
/// `RUST_LOG` overrides `level` when set. Calling this more than once is
/// harmless: later calls leave the first subscriber in place.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
