//! IOC runtime: a message fabric unifying EVT (publish/subscribe), CMD
//! (synchronous request/response) and DAT (reliable ordered streaming)
//! disciplines over a single Link abstraction, with FIFO (in-process) and
//! TCP (loopback) transports. See `SPEC_FULL.md` for the full
//! specification this crate implements and `DESIGN.md` for the grounding
//! ledger behind each module.
//!
//! Every function in [`api`] (re-exported at the crate root) is
//! synchronous from the caller's point of view; the crate runs its own
//! process-wide Tokio runtime internally (see [`runtime`]).

pub mod api;
pub mod cmd;
pub mod conles;
pub mod config;
pub mod dat;
pub mod descriptor;
pub mod error;
pub mod evt;
pub mod ids;
pub mod link;
pub mod logging;
pub mod options;
pub mod registry;
pub mod runtime;
pub mod service;
pub mod state;
#[cfg(feature = "test-hooks")]
pub mod testing;
pub mod transport;

pub use api::{
    accept_client, ack_cmd, broadcast_evt, close_link, connect_service, exec_cmd, flush_dat, force_proc_evt,
    get_link_state, offline_service, online_service, post_evt, recv_dat, register_cmd_executor, register_dat_receiver,
    send_dat, sub_evt, unsub_evt, wait_cmd, wakeup_proc_evt,
};
pub use cmd::CmdExecCallback;
pub use config::{Capabilities, ServiceFlags, ServiceUri};
pub use dat::DatRecvCallback;
pub use descriptor::{CmdDesc, CmdStatus, DatDesc, DatStatus, EvtDesc, INLINE_PAYLOAD_CAP};
pub use error::{IocError, IocResult};
pub use ids::{CmdId, EvtId, LinkId, ServiceId};
pub use options::{Blocking, Options, Reliability};
pub use state::{
    CmdExecutorState, CmdInitiatorState, ConnState, DatReceiverState, DatSenderState, EvtRoleState, LinkStateSnapshot,
    RoleState,
};
