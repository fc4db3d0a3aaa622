//! Option vocabulary shared by every operation (spec §4.1).
//!
//! Unlike the original C source's bit-flag `IOC_Options_T`, this is a
//! plain struct — the bitflag encoding is an ABI concern the original
//! explicitly leaves implementation-defined (see `SPEC_FULL.md` design
//! notes on "Bit-packed IDs"), and a struct is the idiomatic shape here.

use std::time::Duration;

/// Reliability mode. DAT streams are immutably [`Reliability::NoDrop`]
/// regardless of what the caller passes (spec §4.9); EVT defaults to
/// [`Reliability::MayDrop`]; CMD is conceptually NoDrop end-to-end
/// because `exec_cmd` always yields a terminal result (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reliability {
    #[default]
    MayDrop,
    NoDrop,
}

/// Blocking behavior for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blocking {
    /// Wait until the operation can complete, or the link breaks.
    Blocking,
    /// Never wait; return a not-ready code immediately (spec §8.1
    /// property 8, the "NONBLOCK bound").
    NonBlock,
    /// Wait up to the given duration, then return `Timeout`.
    Timeout(Duration),
}

impl Blocking {
    /// The effective wait budget: `None` means wait indefinitely.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Blocking::Blocking => None,
            Blocking::NonBlock => Some(Duration::ZERO),
            Blocking::Timeout(d) => Some(*d),
        }
    }

    pub fn is_nonblock(&self) -> bool {
        matches!(self, Blocking::NonBlock) || matches!(self, Blocking::Timeout(d) if d.is_zero())
    }
}

/// Orthogonal option bag passed to every discipline operation.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub blocking: Blocking,
    /// Only meaningful for `post_evt`; all other disciplines are
    /// inherently synchronous from the caller's point of view.
    pub sync: bool,
    pub reliability: Reliability,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            blocking: Blocking::Blocking,
            sync: false,
            reliability: Reliability::MayDrop,
        }
    }
}

impl Options {
    pub fn nonblock() -> Self {
        Options {
            blocking: Blocking::NonBlock,
            ..Default::default()
        }
    }

    pub fn timeout(d: Duration) -> Self {
        Options {
            blocking: Blocking::Timeout(d),
            ..Default::default()
        }
    }

    pub fn blocking() -> Self {
        Options::default()
    }

    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn no_drop(mut self) -> Self {
        self.reliability = Reliability::NoDrop;
        self
    }
}
