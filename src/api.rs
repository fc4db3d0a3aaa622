//! The public, synchronous surface (spec §6.2): every function here
//! blocks the calling thread until its operation completes (or its
//! `Options` budget elapses), internally driving the async transport and
//! dispatch machinery via [`crate::runtime::runtime`]. This is the
//! surface `lib.rs` re-exports to crate consumers.

use crate::config::{Capabilities, ServiceFlags, ServiceUri};
use crate::descriptor::{CmdDesc, DatDesc, EvtDesc};
use crate::error::{IocError, IocResult};
use crate::ids::{CmdId, EvtId, LinkId, ServiceId};
use crate::link::Link;
use crate::options::Options;
use crate::registry;
use crate::service::Service;
use crate::state::{ConnState, LinkStateSnapshot};
use crate::transport;
use crate::{cmd, conles, dat, evt};
use std::sync::Arc;
use tracing::{debug, warn};

fn lookup_link(id: LinkId) -> IocResult<Arc<Link>> {
    registry::get_link(id).ok_or(IocError::NotExistLink)
}

fn lookup_service(id: ServiceId) -> IocResult<Arc<Service>> {
    registry::get_service(id).ok_or(IocError::NotExistService)
}

/// `IOC_onlineService` (spec §6.2): parse the URI, claim the transport
/// resource, and register the service.
pub fn online_service(uri: &str, capabilities: Capabilities, flags: ServiceFlags) -> IocResult<ServiceId> {
    let uri = ServiceUri::parse(uri)?;
    let binding = transport::make_binding(uri.clone());
    if let Err(e) = crate::runtime::runtime().block_on(binding.bind()) {
        warn!(uri = %uri.canonical(), error = %e, "online_service failed to bind");
        return Err(e);
    }
    let id = ServiceId::next();
    let svc = Arc::new(Service::new(id, uri.clone(), capabilities, flags, binding));
    registry::insert_service(svc);
    debug!(service_id = %id, uri = %uri.canonical(), "service online");
    Ok(id)
}

/// `IOC_offlineService` (spec §6.2, §3.2, §4.10): closes every
/// server-side Link this service produced via `accept_client` before
/// releasing the transport resource, so no Link outlives the service
/// that owns it.
pub fn offline_service(id: ServiceId) -> IocResult<()> {
    let svc = registry::remove_service(id).ok_or(IocError::NotExistService)?;
    svc.mark_offline();
    for link_id in svc.owned_links() {
        let _ = close_link(link_id);
    }
    let result = crate::runtime::runtime().block_on(svc.binding.unbind());
    debug!(service_id = %id, "service offline");
    result
}

/// `IOC_acceptClient` (spec §6.2): block until a peer connects to
/// `service_id`, producing a new server-side Link.
pub fn accept_client(service_id: ServiceId, capabilities: Capabilities, opts: &Options) -> IocResult<LinkId> {
    let svc = lookup_service(service_id)?;
    if !svc.is_online() {
        return Err(IocError::NotExistService);
    }
    let accepted = match crate::runtime::runtime().block_on(svc.binding.accept(opts)) {
        Ok(a) => a,
        Err(e) => {
            if !e.is_not_ready() {
                warn!(service_id = %service_id, error = %e, "accept_client failed");
            }
            return Err(e);
        }
    };
    let link = Link::new(LinkId::next(), accepted.endpoint, capabilities);
    link.state.set_conn(ConnState::Ready);
    let id = link.id();
    svc.track_link(id);
    registry::insert_link(link);
    debug!(link_id = %id, service_id = %service_id, "client accepted");
    Ok(id)
}

/// `IOC_connectService` (spec §6.2): dial a URI, producing a new
/// client-side Link.
pub fn connect_service(uri: &str, capabilities: Capabilities, opts: &Options) -> IocResult<LinkId> {
    let uri = ServiceUri::parse(uri)?;
    let endpoint = match crate::runtime::runtime().block_on(transport::connect(&uri, opts)) {
        Ok(e) => e,
        Err(e) => {
            if !e.is_not_ready() {
                warn!(uri = %uri.canonical(), error = %e, "connect_service failed");
            }
            return Err(e);
        }
    };
    let link = Link::new(LinkId::next(), endpoint, capabilities);
    link.state.set_conn(ConnState::Ready);
    let id = link.id();
    registry::insert_link(link);
    debug!(link_id = %id, uri = %uri.canonical(), "connected to service");
    Ok(id)
}

/// `IOC_closeLink` (spec §6.2, §4.10): idempotent from the caller's
/// point of view — closing an already-closed or unknown Link is not an
/// error.
pub fn close_link(id: LinkId) -> IocResult<()> {
    if id.is_auto_link() {
        return Err(IocError::InvalidParam("AUTO_LINK cannot be closed"));
    }
    if let Some(link) = registry::remove_link(id) {
        link.state.set_conn(ConnState::Closing);
        link.endpoint.close();
        link.state.set_conn(ConnState::Closed);
        debug!(link_id = %id, "link closed");
    }
    Ok(())
}

/// `IOC_getLinkState` (spec §6.2): one atomic snapshot of all three
/// levels (spec §8.1 property 7).
pub fn get_link_state(id: LinkId) -> IocResult<LinkStateSnapshot> {
    Ok(lookup_link(id)?.state.snapshot())
}

/// `IOC_subEVT` (spec §4.7). `LinkId::AUTO_LINK` routes to the
/// connectionless broadcast group instead of a point-to-point Link.
pub fn sub_evt(link_id: LinkId, evt_ids: &[EvtId], callback: evt::EvtCallback) -> IocResult<u64> {
    if link_id.is_auto_link() {
        return conles::sub_evt(evt_ids, callback);
    }
    let link = lookup_link(link_id)?;
    evt::sub_evt(&link, evt_ids, callback)
}

pub fn unsub_evt(link_id: LinkId, sub_id: u64) -> IocResult<()> {
    if link_id.is_auto_link() {
        return conles::unsub_evt(sub_id);
    }
    let link = lookup_link(link_id)?;
    evt::unsub_evt(&link, sub_id)
}

pub fn post_evt(link_id: LinkId, desc: &EvtDesc, opts: &Options) -> IocResult<()> {
    if link_id.is_auto_link() {
        return conles::broadcast_evt(desc);
    }
    let link = lookup_link(link_id)?;
    crate::runtime::runtime().block_on(evt::post_evt(&link, desc, opts))
}

/// `IOC_broadcastEVT` (spec §4.7): always targets the connectionless
/// group regardless of the Link ID supplied.
pub fn broadcast_evt(desc: &EvtDesc) -> IocResult<()> {
    conles::broadcast_evt(desc)
}

pub fn force_proc_evt(link_id: LinkId, opts: &Options) -> IocResult<()> {
    let link = lookup_link(link_id)?;
    crate::runtime::runtime().block_on(evt::force_proc_evt(&link, opts))
}

pub fn wakeup_proc_evt(link_id: LinkId) -> IocResult<()> {
    let link = lookup_link(link_id)?;
    evt::wakeup_proc_evt(&link);
    Ok(())
}

/// `IOC_execCMD` (spec §4.8).
pub fn exec_cmd(link_id: LinkId, desc: CmdDesc, opts: &Options) -> IocResult<CmdDesc> {
    let link = lookup_link(link_id)?;
    crate::runtime::runtime().block_on(cmd::exec_cmd(&link, desc, opts))
}

/// `IOC_waitCMD` (spec §4.8).
pub fn wait_cmd(link_id: LinkId, opts: &Options) -> IocResult<CmdDesc> {
    let link = lookup_link(link_id)?;
    crate::runtime::runtime().block_on(cmd::wait_cmd(&link, opts))
}

/// `IOC_ackCMD` (spec §4.8).
pub fn ack_cmd(link_id: LinkId, desc: &CmdDesc) -> IocResult<()> {
    let link = lookup_link(link_id)?;
    crate::runtime::runtime().block_on(cmd::ack_cmd(&link, desc))
}

/// Callback-mode CMD executor registration (spec §4.8 "Executor path
/// (callback mode)"). Mutually exclusive with `wait_cmd`/`ack_cmd` on
/// the same link.
pub fn register_cmd_executor(link_id: LinkId, supported: &[CmdId], callback: cmd::CmdExecCallback) -> IocResult<()> {
    let link = lookup_link(link_id)?;
    cmd::register_cmd_executor(&link, supported, callback)
}

/// `IOC_sendDAT` (spec §4.9).
pub fn send_dat(link_id: LinkId, desc: &DatDesc, opts: &Options) -> IocResult<()> {
    let link = lookup_link(link_id)?;
    crate::runtime::runtime().block_on(dat::send_dat(&link, desc, opts))
}

/// `IOC_recvDAT` (spec §4.9).
pub fn recv_dat(link_id: LinkId, opts: &Options) -> IocResult<DatDesc> {
    let link = lookup_link(link_id)?;
    crate::runtime::runtime().block_on(dat::recv_dat(&link, opts))
}

/// `IOC_flushDAT` (spec §4.9).
pub fn flush_dat(link_id: LinkId, opts: &Options) -> IocResult<()> {
    let link = lookup_link(link_id)?;
    crate::runtime::runtime().block_on(dat::flush_dat(&link, opts))
}

/// Callback-mode DAT receiver registration (spec §4.9 "Receiver ...
/// callback mode"). Mutually exclusive with polling `recv_dat` on the
/// same link.
pub fn register_dat_receiver(link_id: LinkId, callback: dat::DatRecvCallback) -> IocResult<()> {
    let link = lookup_link(link_id)?;
    dat::register_dat_receiver(&link, callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{CmdId, EVT_CLASS_TEST};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[test]
    fn connect_to_unknown_uri_is_not_exist_service() {
        let res = connect_service("fifo://LocalProcess/does-not-exist", Capabilities::EVT_PRODUCER, &Options::default());
        assert_eq!(res.unwrap_err(), IocError::NotExistService);
    }

    #[test]
    fn close_unknown_link_is_not_an_error() {
        assert!(close_link(LinkId::next()).is_ok());
    }

    #[test]
    fn online_connect_accept_close_full_cycle() {
        let svc = online_service(
            "fifo://LocalProcess/api-test-1",
            Capabilities::CMD_EXECUTOR,
            ServiceFlags::default(),
        )
        .unwrap();

        let server_thread = std::thread::spawn(move || {
            accept_client(svc, Capabilities::CMD_EXECUTOR, &Options::default()).unwrap()
        });
        let client_link = connect_service(
            "fifo://LocalProcess/api-test-1",
            Capabilities::CMD_INITIATOR,
            &Options::default(),
        )
        .unwrap();
        let server_link = server_thread.join().unwrap();

        assert_eq!(get_link_state(client_link).unwrap().conn, ConnState::Ready);
        assert_eq!(get_link_state(server_link).unwrap().conn, ConnState::Ready);

        close_link(client_link).unwrap();
        close_link(server_link).unwrap();
        offline_service(svc).unwrap();
        assert_eq!(get_link_state(client_link).unwrap_err(), IocError::NotExistLink);
    }

    #[test]
    fn evt_post_and_sub_over_connected_link() {
        let svc = online_service(
            "fifo://LocalProcess/api-test-evt",
            Capabilities::EVT_CONSUMER,
            ServiceFlags::default(),
        )
        .unwrap();
        let server_thread =
            std::thread::spawn(move || accept_client(svc, Capabilities::EVT_CONSUMER, &Options::default()).unwrap());
        let client_link = connect_service(
            "fifo://LocalProcess/api-test-evt",
            Capabilities::EVT_PRODUCER,
            &Options::default(),
        )
        .unwrap();
        let server_link = server_thread.join().unwrap();

        let counter = Arc::new(AtomicU32::new(0));
        let counter2 = counter.clone();
        let evt_id = EvtId::new(EVT_CLASS_TEST, 1);
        sub_evt(
            server_link,
            &[evt_id],
            Arc::new(move |_d| {
                counter2.fetch_add(1, Ordering::SeqCst);
            }),
        )
        .unwrap();

        post_evt(client_link, &EvtDesc::new(evt_id), &Options::default()).unwrap();
        force_proc_evt(server_link, &Options::timeout(Duration::from_millis(200))).unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        close_link(client_link).unwrap();
        close_link(server_link).unwrap();
        offline_service(svc).unwrap();
    }

    #[test]
    fn cmd_exchange_over_connected_link() {
        let svc = online_service(
            "fifo://LocalProcess/api-test-cmd",
            Capabilities::CMD_EXECUTOR,
            ServiceFlags::default(),
        )
        .unwrap();
        let server_thread =
            std::thread::spawn(move || accept_client(svc, Capabilities::CMD_EXECUTOR, &Options::default()).unwrap());
        let client_link = connect_service(
            "fifo://LocalProcess/api-test-cmd",
            Capabilities::CMD_INITIATOR,
            &Options::default(),
        )
        .unwrap();
        let server_link = server_thread.join().unwrap();

        let executor_thread = std::thread::spawn(move || {
            let mut req = wait_cmd(server_link, &Options::default()).unwrap();
            req.complete_success(b"PONG");
            ack_cmd(server_link, &req).unwrap();
        });

        let desc = CmdDesc::new(CmdId::new(1, 1)).with_input(b"PING");
        let reply = exec_cmd(client_link, desc, &Options::default()).unwrap();
        executor_thread.join().unwrap();

        assert_eq!(reply.out_payload.as_slice(), b"PONG");

        close_link(client_link).unwrap();
        close_link(server_link).unwrap();
        offline_service(svc).unwrap();
    }
}
