//! The protocol binding interface (spec §4.2, C3): the uniform contract
//! every transport implements. Realized as two object-safe traits —
//! [`ServiceBinding`] (bind/unbind/accept, owned by a `Service`) and
//! [`LinkEndpoint`] (the per-message-type operations, owned by a
//! `Link`) — grounded in the teacher's `IpcTransport` trait
//! (`examples/redhat-performance-rusty-comms/src/ipc/mod.rs`), split in
//! two because one `IpcTransport` instance there conflated "the
//! listener" and "one connection"; IOC Links need many connections per
//! Service.
//!
//! `connect` is a free function rather than a trait method: a
//! connecting client has no service-side binding of its own to call it
//! on. For FIFO it resolves the target through the registry; for TCP it
//! dials a real socket. See `SPEC_FULL.md` §4.2.

pub mod fifo;
pub mod tcp;

use crate::config::{ProtocolResolved, ServiceUri};
use crate::descriptor::{CmdDesc, DatDesc, EvtDesc};
use crate::error::{IocError, IocResult};
use crate::options::Options;
use async_trait::async_trait;
use std::sync::Arc;

/// A connection handed from a transport's accept path (or connect path)
/// up to the generic `Link`/`Service` machinery. Each transport produces
/// its own concrete [`LinkEndpoint`]; this struct just carries it plus
/// any metadata the generic layer needs.
pub struct Accepted {
    pub endpoint: Arc<dyn LinkEndpoint>,
}

/// Owned by a `Service`. Claims/releases the transport-specific listening
/// resource and produces server-side [`Accepted`] connections.
#[async_trait]
pub trait ServiceBinding: Send + Sync {
    /// Claim the transport-specific resource (spec §4.2 `bind`).
    async fn bind(&self) -> IocResult<()>;

    /// Release the resource. All derived server-side Links must already
    /// be closed, or are forcibly torn down with `Closed` by the caller
    /// before this runs (spec §4.5).
    async fn unbind(&self) -> IocResult<()>;

    /// Block (or time out) until a client connects, producing a
    /// server-side Link (spec §4.2 `accept`).
    async fn accept(&self, opts: &Options) -> IocResult<Accepted>;
}

/// Owned by a `Link`. The per-message-type vocabulary every transport
/// must provide (spec §4.2).
#[async_trait]
pub trait LinkEndpoint: Send + Sync {
    async fn post_event(&self, desc: &EvtDesc, opts: &Options) -> IocResult<()>;
    /// Receive the next event frame (used by the receiving side's
    /// dispatch loop). Not part of the spec's public vocabulary, but
    /// required to realize EVT delivery over a byte-stream transport.
    async fn recv_event(&self) -> IocResult<EvtDesc>;

    async fn send_command(&self, desc: &CmdDesc) -> IocResult<()>;
    async fn recv_command(&self, opts: &Options) -> IocResult<CmdDesc>;
    async fn send_command_reply(&self, desc: &CmdDesc) -> IocResult<()>;
    async fn recv_command_reply(&self, opts: &Options) -> IocResult<CmdDesc>;

    async fn send_data(&self, desc: &DatDesc, opts: &Options) -> IocResult<()>;
    async fn recv_data(&self, opts: &Options) -> IocResult<DatDesc>;
    async fn flush_data(&self, opts: &Options) -> IocResult<()>;

    /// Publish this end's current EVT subscription set to the peer, so
    /// the peer's `post_event` can observe whether anything is listening
    /// before it returns (spec §4.7 `NoEventConsumer`). Called whenever
    /// the local subscriber table changes.
    fn set_local_evt_subscriptions(&self, evt_ids: &[u64]);

    /// True if the peer's last-published subscription set contains
    /// `evt_id`. Consulted by `post_event` to return `NoEventConsumer`
    /// rather than silently succeeding into the void.
    fn peer_subscribed(&self, evt_id: u64) -> bool;

    /// Idempotent; both ends observe `Closed` (spec §4.2 `close`).
    fn close(&self);
}

/// Dial a URI, producing a client-side Link endpoint (spec §4.2
/// `connect`). Dispatches to the FIFO or TCP implementation based on
/// the resolved protocol.
pub async fn connect(uri: &ServiceUri, opts: &Options) -> IocResult<Arc<dyn LinkEndpoint>> {
    match uri.protocol {
        ProtocolResolved::Fifo => fifo::connect(uri, opts).await,
        ProtocolResolved::Tcp => tcp::connect(uri, opts).await,
    }
}

/// Build the `ServiceBinding` appropriate for a URI's resolved protocol.
pub fn make_binding(uri: ServiceUri) -> Arc<dyn ServiceBinding> {
    match uri.protocol {
        ProtocolResolved::Fifo => Arc::new(fifo::FifoServiceBinding::new(uri)),
        ProtocolResolved::Tcp => Arc::new(tcp::TcpServiceBinding::new(uri)),
    }
}

/// Shared helper: translate a `Blocking` budget into an awaited future,
/// uniformly honouring NONBLOCK/TIMEOUT/BLOCKING across transports
/// (spec §4.4: "Timeouts ... must be enforced at the runtime layer").
///
/// `not_ready` is the discipline-specific code to surface when NONBLOCK
/// finds nothing available immediately (`Busy` for CMD, `BufferFull` for
/// DAT send, `NoData` for DAT recv, ... — spec §4.3), since that code is
/// not uniform across disciplines.
pub(crate) async fn with_budget<T, F>(opts: &Options, not_ready: IocError, fut: F) -> IocResult<T>
where
    F: std::future::Future<Output = IocResult<T>>,
{
    match opts.blocking.duration() {
        Some(d) if d.is_zero() => tokio::time::timeout(std::time::Duration::ZERO, fut)
            .await
            .map_err(|_| not_ready)?,
        Some(d) => tokio::time::timeout(d, fut).await.map_err(|_| IocError::Timeout)?,
        None => fut.await,
    }
}
