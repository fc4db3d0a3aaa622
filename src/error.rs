//! The stable result taxonomy every public operation returns.
//!
//! The runtime never unwinds across its public API: every fallible
//! operation returns [`IocResult<T>`], never a panic. Internal invariant
//! violations map to [`IocError::Bug`]; tests treat any occurrence as a
//! failure (see `tests/`).

use thiserror::Error;

/// Closed vocabulary of result kinds, per the spec's error taxonomy.
///
/// Variant names are the stable, spec-level names, not free-form strings —
/// callers match on the variant, not on `to_string()`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IocError {
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    #[error("link does not exist")]
    NotExistLink,

    #[error("service does not exist")]
    NotExistService,

    #[error("link is broken")]
    LinkBroken,

    #[error("operation timed out")]
    Timeout,

    #[error("executor or resource is busy")]
    Busy,

    #[error("buffer is full")]
    BufferFull,

    #[error("no data available")]
    NoData,

    #[error("no command is pending")]
    NoCmdPending,

    #[error("stream is closed")]
    StreamClosed,

    #[error("data chunk too large")]
    DataTooLarge,

    #[error("data corrupted in transit")]
    DataCorrupted,

    #[error("no event consumer subscribed")]
    NoEventConsumer,

    #[error("too many event consumers")]
    TooManyEventConsumers,

    #[error("conflicting event consumer registration")]
    ConflictEventConsumer,

    #[error("port already in use")]
    PortInUse,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("no command executor registered for this command")]
    NoCmdExecutor,

    #[error("command executor reported failure")]
    CmdExecFailed,

    #[error("operation not supported by this link/service")]
    NotSupported,

    #[error("operation not implemented")]
    NotImplemented,

    #[error("out of memory (POSIX ENOMEM)")]
    PosixEnomem,

    /// Catch-all for invariant violations. Any occurrence is a defect in
    /// the runtime, never an expected caller-facing condition.
    #[error("internal invariant violated: {0}")]
    Bug(&'static str),
}

/// Result alias used by every public operation in this crate.
pub type IocResult<T> = Result<T, IocError>;

impl IocError {
    /// True for conditions where NONBLOCK callers should treat the
    /// operation as "not ready right now" rather than a hard failure.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            IocError::Busy | IocError::BufferFull | IocError::NoData | IocError::NoCmdPending
        )
    }
}

impl From<std::io::Error> for IocError {
    fn from(e: std::io::Error) -> Self {
        use std::io::ErrorKind::*;
        match e.kind() {
            ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof | NotConnected => {
                IocError::LinkBroken
            }
            TimedOut => IocError::Timeout,
            AddrInUse => IocError::PortInUse,
            ConnectionRefused => IocError::ConnectionRefused,
            _ => IocError::Bug("unclassified io error"),
        }
    }
}

impl From<bincode::Error> for IocError {
    fn from(_: bincode::Error) -> Self {
        IocError::DataCorrupted
    }
}

impl From<tokio::time::error::Elapsed> for IocError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        IocError::Timeout
    }
}
