//! Loopback TCP transport (spec §4.4, C4): one frame type per message
//! kind, length-prefixed, multiplexed over a single `TcpStream` per
//! Link. Grounded in the teacher's `TcpTransport`
//! (`examples/redhat-performance-rusty-comms/src/ipc/tcp.rs`), which
//! frames length-prefixed `bincode` messages over `tokio::net::TcpStream`
//! the same way; generalized from one message type to four tagged frame
//! kinds multiplexed on one connection.

use super::{Accepted, LinkEndpoint, ServiceBinding};
use crate::config::{runtime_config, ServiceUri};
use crate::descriptor::{self, CmdDesc, DatDesc, EvtDesc, WireCmd, WireDat, WireEvt};
use crate::error::{IocError, IocResult};
use crate::options::Options;
use async_trait::async_trait;
use parking_lot::RwLock as SyncRwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

const FRAME_EVT: u8 = 1;
const FRAME_CMD_REQ: u8 = 2;
const FRAME_CMD_REPLY: u8 = 3;
const FRAME_DAT: u8 = 4;
/// Out-of-band control frame carrying this end's current EVT
/// subscription set (bincode-encoded `Vec<u64>`), so the peer's
/// `post_event` can observe whether a `postEVT` has anything to land on
/// before returning (spec §4.7 `NoEventConsumer`).
const FRAME_SUB_NOTIFY: u8 = 5;

/// `type(1) | reserved(1) | length(4, big-endian) | body` (spec §4.4).
async fn write_frame(stream: &mut (impl AsyncWriteExt + Unpin), kind: u8, body: &[u8]) -> IocResult<()> {
    if body.len() as u64 > runtime_config().tcp_max_frame_bytes as u64 {
        return Err(IocError::DataTooLarge);
    }
    let mut header = [0u8; 6];
    header[0] = kind;
    header[1] = 0;
    header[2..6].copy_from_slice(&(body.len() as u32).to_be_bytes());
    stream.write_all(&header).await?;
    stream.write_all(body).await?;
    Ok(())
}

async fn read_frame(stream: &mut (impl AsyncReadExt + Unpin)) -> IocResult<(u8, Vec<u8>)> {
    let mut header = [0u8; 6];
    stream.read_exact(&mut header).await?;
    let kind = header[0];
    let len = u32::from_be_bytes([header[2], header[3], header[4], header[5]]);
    if len > runtime_config().tcp_max_frame_bytes {
        return Err(IocError::DataTooLarge);
    }
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    Ok((kind, body))
}

/// One read-dispatch loop demultiplexes the shared stream into four
/// per-kind channels; writers serialize through a single mutex since
/// TCP streams have one write half.
struct Demux {
    write_half: Arc<Mutex<tokio::net::tcp::OwnedWriteHalf>>,
    rx_evt: Mutex<mpsc::Receiver<EvtDesc>>,
    rx_cmd_req: Mutex<mpsc::Receiver<CmdDesc>>,
    rx_cmd_reply: Mutex<mpsc::Receiver<CmdDesc>>,
    rx_dat: Mutex<mpsc::Receiver<DatDesc>>,
    closed: AtomicBool,
    /// Last subscription set the peer published via `FRAME_SUB_NOTIFY`.
    peer_evt_subs: Arc<SyncRwLock<HashSet<u64>>>,
}

pub struct TcpLinkEndpoint {
    demux: Demux,
}

fn spawn_reader(
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    tx_evt: mpsc::Sender<EvtDesc>,
    tx_cmd_req: mpsc::Sender<CmdDesc>,
    tx_cmd_reply: mpsc::Sender<CmdDesc>,
    tx_dat: mpsc::Sender<DatDesc>,
    peer_evt_subs: Arc<SyncRwLock<HashSet<u64>>>,
) {
    tokio::spawn(async move {
        loop {
            let (kind, body) = match read_frame(&mut read_half).await {
                Ok(v) => v,
                Err(_) => break,
            };
            // `send().await` rather than `try_send`: a momentarily full
            // per-kind queue should apply backpressure on this
            // connection's reader, not be treated as a dead link.
            let delivered = match kind {
                FRAME_EVT => match descriptor::decode::<WireEvt>(&body) {
                    Ok(w) => tx_evt.send(w.into()).await.is_ok(),
                    Err(_) => false,
                },
                FRAME_CMD_REQ => match descriptor::decode::<WireCmd>(&body) {
                    Ok(w) => tx_cmd_req.send(w.into()).await.is_ok(),
                    Err(_) => false,
                },
                FRAME_CMD_REPLY => match descriptor::decode::<WireCmd>(&body) {
                    Ok(w) => tx_cmd_reply.send(w.into()).await.is_ok(),
                    Err(_) => false,
                },
                FRAME_DAT => match descriptor::decode::<WireDat>(&body) {
                    Ok(w) => tx_dat.send(w.into()).await.is_ok(),
                    Err(_) => false,
                },
                FRAME_SUB_NOTIFY => match descriptor::decode::<Vec<u64>>(&body) {
                    Ok(ids) => {
                        *peer_evt_subs.write() = ids.into_iter().collect();
                        true
                    }
                    Err(_) => false,
                },
                _ => false,
            };
            if !delivered {
                break;
            }
        }
    });
}

impl TcpLinkEndpoint {
    fn new(stream: TcpStream) -> Self {
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();
        let depth = runtime_config().fifo_queue_depth;
        let (tx_evt, rx_evt) = mpsc::channel(depth);
        let (tx_cmd_req, rx_cmd_req) = mpsc::channel(depth);
        let (tx_cmd_reply, rx_cmd_reply) = mpsc::channel(depth);
        let (tx_dat, rx_dat) = mpsc::channel(depth);
        let peer_evt_subs = Arc::new(SyncRwLock::new(HashSet::new()));
        spawn_reader(read_half, tx_evt, tx_cmd_req, tx_cmd_reply, tx_dat, peer_evt_subs.clone());
        TcpLinkEndpoint {
            demux: Demux {
                write_half: Arc::new(Mutex::new(write_half)),
                rx_evt: Mutex::new(rx_evt),
                rx_cmd_req: Mutex::new(rx_cmd_req),
                rx_cmd_reply: Mutex::new(rx_cmd_reply),
                rx_dat: Mutex::new(rx_dat),
                closed: AtomicBool::new(false),
                peer_evt_subs,
            },
        }
    }

    fn check_open(&self) -> IocResult<()> {
        if self.demux.closed.load(Ordering::Acquire) {
            Err(IocError::LinkBroken)
        } else {
            Ok(())
        }
    }

    async fn write_kind<T: serde::Serialize>(&self, kind: u8, wire: &T) -> IocResult<()> {
        self.check_open()?;
        let body = descriptor::encode(wire)?;
        let mut w = self.demux.write_half.lock().await;
        write_frame(&mut *w, kind, &body).await
    }
}

#[async_trait]
impl LinkEndpoint for TcpLinkEndpoint {
    async fn post_event(&self, desc: &EvtDesc, opts: &Options) -> IocResult<()> {
        let wire = WireEvt::from(desc);
        super::with_budget(opts, IocError::BufferFull, self.write_kind(FRAME_EVT, &wire)).await
    }

    async fn recv_event(&self) -> IocResult<EvtDesc> {
        self.demux
            .rx_evt
            .lock()
            .await
            .recv()
            .await
            .ok_or(IocError::LinkBroken)
    }

    async fn send_command(&self, desc: &CmdDesc) -> IocResult<()> {
        let wire = WireCmd::from(desc);
        self.write_kind(FRAME_CMD_REQ, &wire).await
    }

    async fn recv_command(&self, opts: &Options) -> IocResult<CmdDesc> {
        self.check_open()?;
        if opts.blocking.is_nonblock() {
            self.demux
                .rx_cmd_req
                .lock()
                .await
                .try_recv()
                .map_err(|_| IocError::NoCmdPending)
        } else {
            super::with_budget(opts, IocError::NoCmdPending, async {
                self.demux
                    .rx_cmd_req
                    .lock()
                    .await
                    .recv()
                    .await
                    .ok_or(IocError::LinkBroken)
            })
            .await
        }
    }

    async fn send_command_reply(&self, desc: &CmdDesc) -> IocResult<()> {
        let wire = WireCmd::from(desc);
        self.write_kind(FRAME_CMD_REPLY, &wire).await
    }

    async fn recv_command_reply(&self, opts: &Options) -> IocResult<CmdDesc> {
        super::with_budget(opts, IocError::Timeout, async {
            self.demux
                .rx_cmd_reply
                .lock()
                .await
                .recv()
                .await
                .ok_or(IocError::LinkBroken)
        })
        .await
    }

    async fn send_data(&self, desc: &DatDesc, opts: &Options) -> IocResult<()> {
        let wire = WireDat::from(desc);
        super::with_budget(opts, IocError::BufferFull, self.write_kind(FRAME_DAT, &wire)).await
    }

    async fn recv_data(&self, opts: &Options) -> IocResult<DatDesc> {
        if opts.blocking.is_nonblock() {
            self.demux
                .rx_dat
                .lock()
                .await
                .try_recv()
                .map_err(|_| IocError::NoData)
        } else {
            super::with_budget(opts, IocError::NoData, async {
                self.demux
                    .rx_dat
                    .lock()
                    .await
                    .recv()
                    .await
                    .ok_or(IocError::LinkBroken)
            })
            .await
        }
    }

    async fn flush_data(&self, _opts: &Options) -> IocResult<()> {
        self.check_open()?;
        self.demux
            .write_half
            .lock()
            .await
            .flush()
            .await
            .map_err(IocError::from)
    }

    /// Fire-and-forget: `LinkEndpoint` keeps this method synchronous for
    /// object-safety, so the actual frame write happens on a background
    /// task cloning the shared write-half mutex.
    fn set_local_evt_subscriptions(&self, evt_ids: &[u64]) {
        if self.check_open().is_err() {
            return;
        }
        let ids = evt_ids.to_vec();
        let write_half = self.demux.write_half.clone();
        tokio::spawn(async move {
            let body = match descriptor::encode(&ids) {
                Ok(b) => b,
                Err(_) => return,
            };
            let mut w = write_half.lock().await;
            if let Err(e) = write_frame(&mut *w, FRAME_SUB_NOTIFY, &body).await {
                warn!(error = %e, "failed to publish evt subscription set");
            }
        });
    }

    fn peer_subscribed(&self, evt_id: u64) -> bool {
        self.demux.peer_evt_subs.read().contains(&evt_id)
    }

    fn close(&self) {
        self.demux.closed.store(true, Ordering::Release);
        debug!("tcp link endpoint closed");
    }
}

pub struct TcpServiceBinding {
    uri: ServiceUri,
    listener: Mutex<Option<TcpListener>>,
}

impl TcpServiceBinding {
    pub fn new(uri: ServiceUri) -> Self {
        TcpServiceBinding {
            uri,
            listener: Mutex::new(None),
        }
    }
}

#[async_trait]
impl ServiceBinding for TcpServiceBinding {
    async fn bind(&self) -> IocResult<()> {
        let port = self.uri.port.ok_or(IocError::InvalidParam("TCP URI requires a port"))?;
        let addr = format!("{}:{}", self.uri.host, port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            warn!(addr = %addr, error = %e, "tcp bind failed");
            IocError::from(e)
        })?;
        debug!(addr = %addr, "tcp service bound");
        *self.listener.lock().await = Some(listener);
        Ok(())
    }

    async fn unbind(&self) -> IocResult<()> {
        self.listener.lock().await.take();
        debug!(uri = %self.uri.canonical(), "tcp service unbound");
        Ok(())
    }

    async fn accept(&self, opts: &Options) -> IocResult<Accepted> {
        let guard = self.listener.lock().await;
        let listener = guard.as_ref().ok_or(IocError::NotExistService)?;
        let (stream, addr) = super::with_budget(opts, IocError::Timeout, async {
            listener.accept().await.map_err(IocError::from)
        })
        .await?;
        debug!(peer = %addr, "tcp client accepted");
        Ok(Accepted {
            endpoint: Arc::new(TcpLinkEndpoint::new(stream)),
        })
    }
}

pub async fn connect(uri: &ServiceUri, opts: &Options) -> IocResult<Arc<dyn LinkEndpoint>> {
    let port = uri.port.ok_or(IocError::InvalidParam("TCP URI requires a port"))?;
    let addr = format!("{}:{}", uri.host, port);
    let stream = super::with_budget(opts, IocError::Timeout, async {
        TcpStream::connect(&addr).await.map_err(IocError::from)
    })
    .await
    .map_err(|e| {
        warn!(addr = %addr, error = %e, "tcp connect failed");
        e
    })?;
    debug!(addr = %addr, "tcp link connected");
    Ok(Arc::new(TcpLinkEndpoint::new(stream)))
}
