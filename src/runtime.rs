//! Process-wide Tokio runtime backing the synchronous public API (spec
//! §6.2: every `IOC_*` call is a blocking function from the caller's
//! point of view). Grounded in the teacher's `#[tokio::main]` harness
//! (`examples/redhat-performance-rusty-comms/src/main.rs`), inverted:
//! the teacher's binary owns the runtime and runs async code directly;
//! this crate is a library whose public functions must stay synchronous,
//! so a single multi-threaded [`tokio::runtime::Runtime`] is built once
//! and every public call does `runtime().block_on(...)` against it.

use std::sync::OnceLock;
use tokio::runtime::Runtime;

pub fn runtime() -> &'static Runtime {
    static RUNTIME: OnceLock<Runtime> = OnceLock::new();
    RUNTIME.get_or_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("ioc-runtime-worker")
            .build()
            .expect("failed to start IOC runtime's Tokio executor")
    })
}
