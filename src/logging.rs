//! Tracing setup (ambient stack, `SPEC_FULL.md` §2), grounded in the
//! teacher's `tracing_subscriber::fmt().with_env_filter(...)` init
//! (`examples/redhat-performance-rusty-comms/src/main.rs`), minus the
//! teacher's `colored`-backed human summary printer, which belongs to
//! its CLI and has no counterpart here.

use std::sync::Once;

static INIT: Once = Once::new();

/// Install a global `tracing` subscriber reading `RUST_LOG`, defaulting
/// to `info`. Safe to call more than once; only the first call takes
/// effect. Libraries normally leave subscriber installation to the
/// binary that embeds them, but this crate ships no binary of its own,
/// so callers (and the test suite) opt in explicitly.
pub fn init() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .ok();
    });
}
