//! DAT discipline (spec §4.9, C7): reliable, ordered byte-stream
//! transfer. Always `Reliability::NoDrop` regardless of the caller's
//! `Options` (spec §4.9) — transports never silently discard a DAT
//! chunk once `send_dat` has accepted it. The receiver side has two
//! mutually exclusive modes: polling `recv_dat`, and
//! `register_dat_receiver`, which spawns a background loop invoking a
//! callback for every inbound chunk (spec §4.9 "Receiver ... callback
//! mode").

use crate::config::Capabilities;
use crate::descriptor::DatDesc;
use crate::error::{IocError, IocResult};
use crate::link::Link;
use crate::options::Options;
use crate::state::{DatReceiverState, DatSenderState};
use std::sync::Arc;

/// `sendDAT` (spec §4.9). A zero-length payload is rejected outright
/// (resolved open question, `SPEC_FULL.md` §4.9): the original treats it
/// as a no-op, but a typed Rust API can reject it as a caller error
/// instead of silently doing nothing.
pub async fn send_dat(link: &Link, desc: &DatDesc, opts: &Options) -> IocResult<()> {
    if !link.capabilities.contains(Capabilities::DAT_SENDER) {
        return Err(IocError::NotSupported);
    }
    if desc.payload.is_empty() {
        return Err(IocError::InvalidParam("DAT payload must be non-empty"));
    }
    #[cfg(feature = "test-hooks")]
    if desc.payload.len() > crate::descriptor::INLINE_PAYLOAD_CAP && crate::testing::take_fail_next_alloc() {
        return Err(IocError::PosixEnomem);
    }
    link.state.set_dat_sender(DatSenderState::BusySendDat);
    let result = tokio::select! {
        r = link.endpoint.send_data(desc, opts) => r,
        _ = link.state.wait_closed() => Err(IocError::LinkBroken),
    };
    link.state.set_dat_sender(DatSenderState::Ready);
    result
}

/// `recvDAT` (spec §4.9), polling form. Rejected with `NotSupported`
/// once a callback receiver is registered on this link.
pub async fn recv_dat(link: &Link, opts: &Options) -> IocResult<DatDesc> {
    if !link.capabilities.contains(Capabilities::DAT_RECEIVER) {
        return Err(IocError::NotSupported);
    }
    if link.dat_receiver_cb.read().is_some() {
        return Err(IocError::NotSupported);
    }
    link.state.set_dat_receiver(DatReceiverState::BusyRecvDat);
    let result = tokio::select! {
        r = link.endpoint.recv_data(opts) => r,
        _ = link.state.wait_closed() => Err(IocError::LinkBroken),
    };
    link.state.set_dat_receiver(DatReceiverState::Ready);
    result
}

/// `flushDAT` (spec §4.9): barrier ensuring prior `send_dat` calls have
/// left the local transport, not that the peer has consumed them.
pub async fn flush_dat(link: &Link, opts: &Options) -> IocResult<()> {
    if !link.capabilities.contains(Capabilities::DAT_SENDER) {
        return Err(IocError::NotSupported);
    }
    tokio::select! {
        r = link.endpoint.flush_data(opts) => r,
        _ = link.state.wait_closed() => Err(IocError::LinkBroken),
    }
}

/// Invoked with each inbound chunk while the link's `DatReceiverState`
/// is `BusyCbRecvDat` (spec §4.9).
pub type DatRecvCallback = Arc<dyn Fn(&DatDesc) + Send + Sync>;

/// `IOC_registerDatReceiver` equivalent (spec §4.9 callback mode):
/// installs `callback` and starts a background loop draining
/// `endpoint.recv_data` into it, holding `DatReceiverState::BusyCbRecvDat`
/// for the duration of each callback invocation.
pub fn register_dat_receiver(link: &Arc<Link>, callback: DatRecvCallback) -> IocResult<()> {
    if !link.capabilities.contains(Capabilities::DAT_RECEIVER) {
        return Err(IocError::NotSupported);
    }
    let mut reg = link.dat_receiver_cb.write();
    if reg.is_some() {
        return Err(IocError::Busy);
    }
    *reg = Some(callback);
    drop(reg);
    spawn_receiver_loop(link.clone());
    Ok(())
}

fn spawn_receiver_loop(link: Arc<Link>) {
    crate::runtime::runtime().spawn(async move {
        loop {
            let default_opts = Options::default();
            let chunk = tokio::select! {
                r = link.endpoint.recv_data(&default_opts) => r,
                _ = link.state.wait_closed() => Err(IocError::LinkBroken),
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(_) => break,
            };
            link.state.set_dat_receiver(DatReceiverState::BusyCbRecvDat);
            if let Some(cb) = link.dat_receiver_cb.read().as_ref() {
                cb(&chunk);
            }
            link.state.set_dat_receiver(DatReceiverState::Ready);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::LinkId;
    use crate::transport::fifo;

    #[test]
    fn zero_length_payload_is_rejected() {
        let rt = crate::runtime::runtime();
        rt.block_on(async {
            let uri = crate::config::ServiceUri::parse("fifo://LocalProcess/dat-test-1").unwrap();
            let binding = fifo::FifoServiceBinding::new(uri.clone());
            crate::transport::ServiceBinding::bind(&binding).await.unwrap();
            let opts = Options::default();
            let accept_fut = crate::transport::ServiceBinding::accept(&binding, &opts);
            let connect_fut = fifo::connect(&uri, &opts);
            let (accepted, client) = tokio::join!(accept_fut, connect_fut);
            let _server_ep = accepted.unwrap().endpoint;
            let link = Link::new(LinkId::next(), client.unwrap(), Capabilities::DAT_SENDER);
            let desc = DatDesc::new(b"");
            let res = send_dat(&link, &desc, &Options::default()).await;
            assert_eq!(res.unwrap_err(), IocError::InvalidParam("DAT payload must be non-empty"));
        });
    }

    #[test]
    fn send_then_recv_round_trips_payload() {
        let rt = crate::runtime::runtime();
        rt.block_on(async {
            let uri = crate::config::ServiceUri::parse("fifo://LocalProcess/dat-test-2").unwrap();
            let binding = fifo::FifoServiceBinding::new(uri.clone());
            crate::transport::ServiceBinding::bind(&binding).await.unwrap();
            let opts = Options::default();
            let accept_fut = crate::transport::ServiceBinding::accept(&binding, &opts);
            let connect_fut = fifo::connect(&uri, &opts);
            let (accepted, client) = tokio::join!(accept_fut, connect_fut);
            let server_ep = accepted.unwrap().endpoint;
            let client_ep = client.unwrap();

            let sender = Link::new(LinkId::next(), client_ep, Capabilities::DAT_SENDER);
            let receiver = Link::new(LinkId::next(), server_ep, Capabilities::DAT_RECEIVER);

            send_dat(&sender, &DatDesc::new(b"hello"), &Options::default()).await.unwrap();
            let got = recv_dat(&receiver, &Options::default()).await.unwrap();
            assert_eq!(got.payload.as_slice(), b"hello");
        });
    }
}
