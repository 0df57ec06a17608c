//! Tracing subscriber setup for the binary.
//!
//! Library code only emits events; installing a subscriber is the binary's job.
//! Output goes to stderr so stdout stays a clean JSON channel for `call`/`serve`.

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Safe to call more than once.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_env("FIBERMAP_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
