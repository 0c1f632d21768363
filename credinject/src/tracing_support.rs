//! Support for tracing execution of a program that embeds `credinject`.

use tracing_subscriber::{
    fmt::{format::FmtSpan, Subscriber},
    prelude::*,
    EnvFilter,
};

/// Set up the `tracing` library with reasonable options, filtered by
/// `RUST_LOG`. Does nothing if a global subscriber has already been installed.
pub fn initialize_tracing() {
    let filter = EnvFilter::from_default_env();
    let result = Subscriber::builder()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_env_filter(filter)
        .finish()
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
