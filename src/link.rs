//! A bidirectional connection between two endpoints (spec §3.1, §3.5,
//! C1): owns a transport [`LinkEndpoint`], the three-level state machine,
//! and per-direction sequence counters for [`MsgHeader`](crate::descriptor::MsgHeader).

use crate::cmd::CmdExecutorReg;
use crate::config::Capabilities;
use crate::dat::DatRecvCallback;
use crate::evt::EvtDispatch;
use crate::ids::LinkId;
use crate::state::LinkState;
use crate::transport::LinkEndpoint;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub struct Link {
    id: LinkId,
    pub endpoint: Arc<dyn LinkEndpoint>,
    pub state: LinkState,
    pub capabilities: Capabilities,
    pub evt: EvtDispatch,
    send_seq: AtomicU64,
    /// Set by `register_cmd_executor`; mutually exclusive with polling
    /// `wait_cmd` (spec §4.8 "Executor path (callback mode)").
    pub(crate) cmd_executor_reg: RwLock<Option<CmdExecutorReg>>,
    /// Set by `register_dat_receiver`; mutually exclusive with polling
    /// `recv_dat` (spec §4.9 callback-mode receiver).
    pub(crate) dat_receiver_cb: RwLock<Option<DatRecvCallback>>,
}

impl Link {
    /// Builds the Link and, if it can consume events, starts the
    /// background dispatch loop that drains `endpoint.recv_event()` into
    /// subscriber callbacks (spec §4.7 `subEVT`/`postEVT`).
    pub fn new(id: LinkId, endpoint: Arc<dyn LinkEndpoint>, capabilities: Capabilities) -> Arc<Self> {
        let link = Arc::new(Link {
            id,
            endpoint,
            state: LinkState::default(),
            capabilities,
            evt: EvtDispatch::default(),
            send_seq: AtomicU64::new(1),
            cmd_executor_reg: RwLock::new(None),
            dat_receiver_cb: RwLock::new(None),
        });
        if capabilities.contains(Capabilities::EVT_CONSUMER) {
            crate::evt::spawn_dispatch_loop(link.clone());
        }
        link
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn next_send_seq(&self) -> u64 {
        self.send_seq.fetch_add(1, Ordering::Relaxed)
    }
}
