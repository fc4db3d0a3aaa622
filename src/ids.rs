//! Typed identifiers for services, links and the two class-of-message IDs.
//!
//! `CmdId`/`EvtId` pack a class tag and a name tag per spec §3.1. The
//! original C source bit-packs both into a single 64-bit field at the
//! ABI boundary; internally we keep the pair as two `u32`s (see
//! `SPEC_FULL.md` §3) and only combine them into the packed `u64` form
//! that callers construct/compare/hash.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Process-wide monotonic counters backing [`ServiceId`]/[`LinkId`]
/// issuance. A closed `LinkId` is never reused for the life of the
/// process (spec §3.3 invariant 1, §8.1 property 3).
static NEXT_SERVICE_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_LINK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque handle identifying a bound service endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub(crate) u64);

impl ServiceId {
    pub(crate) fn next() -> Self {
        ServiceId(NEXT_SERVICE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Srv#{}", self.0)
    }
}

/// Opaque handle identifying one end of a bidirectional Link, or the
/// broadcast root of a connectionless group (the distinguished
/// `LinkId::AUTO_LINK` sentinel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub(crate) u64);

impl LinkId {
    /// Process-wide connectionless event link (spec §3.1).
    pub const AUTO_LINK: LinkId = LinkId(0);

    pub(crate) fn next() -> Self {
        // The counter starts at 1 so AUTO_LINK's 0 is never issued.
        LinkId(NEXT_LINK_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_auto_link(&self) -> bool {
        self.0 == 0
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_auto_link() {
            write!(f, "Link#AUTO")
        } else {
            write!(f, "Link#{}", self.0)
        }
    }
}

/// A 64-bit logical command identifier composed of a class tag (low 32
/// bits) and a name tag (high 32 bits). Construction/decomposition are
/// total and inverse, per spec §3.1; the packed layout itself is not a
/// public contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CmdId(u64);

/// A 64-bit logical event identifier, same shape as [`CmdId`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvtId(u64);

macro_rules! impl_msg_id {
    ($ty:ident) => {
        impl $ty {
            pub const fn new(class: u32, name: u32) -> Self {
                $ty((class as u64) | ((name as u64) << 32))
            }

            pub const fn class(&self) -> u32 {
                (self.0 & 0xFFFF_FFFF) as u32
            }

            pub const fn name(&self) -> u32 {
                (self.0 >> 32) as u32
            }

            pub const fn packed(&self) -> u64 {
                self.0
            }

            pub const fn from_packed(value: u64) -> Self {
                $ty(value)
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}::{}", self.class(), self.name())
            }
        }

        impl From<(u32, u32)> for $ty {
            fn from((class, name): (u32, u32)) -> Self {
                $ty::new(class, name)
            }
        }
    };
}

impl_msg_id!(CmdId);
impl_msg_id!(EvtId);

/// Registry of human-readable names for well-known classes/names, used
/// by the `Display`-adjacent helpers below. Applications are free to
/// ignore this and work with the raw `(class, name)` pair; it exists to
/// make `tracing` output and test failures legible, mirroring the
/// original's `IOC_getEvtClassStr`/`IOC_getEvtNameStr` helpers.
pub trait NameLookup {
    fn class_str(&self) -> &'static str {
        "UNKNOWN"
    }
    fn name_str(&self) -> &'static str {
        "UNKNOWN"
    }
}

impl NameLookup for CmdId {}
impl NameLookup for EvtId {}

/// Well-known event class used across the test suite.
pub const EVT_CLASS_TEST: u32 = 1;
/// Well-known command class used across the test suite.
pub const CMD_CLASS_TEST: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evt_id_construct_decompose_is_total_and_inverse() {
        for class in [0u32, 1, 7, u32::MAX] {
            for name in [0u32, 1, 1234, u32::MAX] {
                let id = EvtId::new(class, name);
                assert_eq!(id.class(), class);
                assert_eq!(id.name(), name);
                assert_eq!(EvtId::from_packed(id.packed()), id);
            }
        }
    }

    #[test]
    fn link_id_never_issues_auto_link_sentinel() {
        for _ in 0..1000 {
            assert!(!LinkId::next().is_auto_link());
        }
    }

    #[test]
    fn service_and_link_ids_are_monotonic() {
        let a = ServiceId::next();
        let b = ServiceId::next();
        assert!(b.as_u64() > a.as_u64());
    }
}
