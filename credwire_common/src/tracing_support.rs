//! Support for tracing execution of a program.

use tracing_subscriber::{fmt::Subscriber, prelude::*, EnvFilter};

/// Set up the `tracing` library with reasonable options. Log output goes to
/// standard error, so it never mixes with manifests printed on standard
/// output. Defaults to `warn` when `RUST_LOG` is unset.
pub fn initialize_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .finish()
        .init();
}
