//! Log subscriber setup for the binary

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Install a stderr subscriber. `RUST_LOG` wins; otherwise this crate
/// logs at `info` (or `debug` when `verbose`) and dependencies at `warn`.
pub fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("trueno_mlops={level},warn")));

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    // A second init (tests, embedding) keeps the first subscriber
    let _ = Registry::default().with(env_filter).with(fmt_layer).try_init();
}
