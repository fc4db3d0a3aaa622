//! Test-only diagnostic surface, gated behind the `test-hooks` Cargo
//! feature so production builds never link it (spec §6.4; grounded in
//! `original_source/Include/IOC/IOC_TestHooks.h`'s force-fail/introspection
//! API). `service_count`/`link_count` are thin re-exports of the
//! registry's own counters; `set_fail_next_alloc` arms a decrementing
//! counter consumed by the next N oversized DAT/CMD payload allocations.

use std::sync::atomic::{AtomicI64, Ordering};

static FAIL_NEXT_ALLOC: AtomicI64 = AtomicI64::new(0);

/// Arms the next `n` allocations (at the two sites that spill a payload
/// out of its inline buffer — `execCMD`/`sendDAT`) to fail with
/// `PosixEnomem`, mirroring the original's `IOC_forceFailNextAlloc(n)`.
/// `n <= 0` disarms it. Each consultation via [`take_fail_next_alloc`]
/// decrements the counter by one; it self-disarms once it reaches zero.
pub fn set_fail_next_alloc(n: i64) {
    FAIL_NEXT_ALLOC.store(n.max(0), Ordering::SeqCst);
}

pub(crate) fn take_fail_next_alloc() -> bool {
    let mut current = FAIL_NEXT_ALLOC.load(Ordering::SeqCst);
    loop {
        if current <= 0 {
            return false;
        }
        match FAIL_NEXT_ALLOC.compare_exchange_weak(
            current,
            current - 1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => return true,
            Err(actual) => current = actual,
        }
    }
}

pub use crate::registry::{link_count, service_count};
pub use crate::registry::test_hooks::{all_link_ids, all_service_ids, reset_all};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_next_alloc_counts_down() {
        set_fail_next_alloc(2);
        assert!(take_fail_next_alloc());
        assert!(take_fail_next_alloc());
        assert!(!take_fail_next_alloc());
    }

    #[test]
    fn fail_next_alloc_disarms_on_non_positive() {
        set_fail_next_alloc(0);
        assert!(!take_fail_next_alloc());
        set_fail_next_alloc(-3);
        assert!(!take_fail_next_alloc());
    }
}
