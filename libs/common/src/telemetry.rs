//! Tracing bootstrap for the service binaries

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber.
///
/// The filter is read from `RUST_LOG`; when it is absent or unparsable the
/// given default directive is used instead (e.g. `"info"` or
/// `"api=debug,dispatch=debug"`).
pub fn init_tracing(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // A second call (tests, embedded use) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
