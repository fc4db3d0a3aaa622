//! EVT discipline (spec §4.7, C5): fire-and-forget pub/sub over a
//! connected Link. A background dispatch task drains
//! `endpoint.recv_event()` into registered callbacks — `forceProcEvt`
//! blocks the caller until that task has made progress, `wakeupProcEvt`
//! nudges it (spec §9 open question 3, resolved in `SPEC_FULL.md` §4.7:
//! dispatch always runs on worker threads; `forceProcEvt` is a progress
//! barrier, `wakeupProcEvt` a no-op `Notify` ping).

use crate::config::Capabilities;
use crate::descriptor::EvtDesc;
use crate::error::{IocError, IocResult};
use crate::ids::EvtId;
use crate::link::Link;
use crate::options::Options;
use crate::state::ConnState;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

pub type EvtCallback = Arc<dyn Fn(&EvtDesc) + Send + Sync>;

struct Subscription {
    id: u64,
    evt_ids: Vec<EvtId>,
    callback: EvtCallback,
}

/// Per-link subscriber table and progress counter.
pub struct EvtDispatch {
    subs: RwLock<Vec<Subscription>>,
    next_sub_id: AtomicU64,
    processed: AtomicU64,
    notify: Notify,
}

impl Default for EvtDispatch {
    fn default() -> Self {
        EvtDispatch {
            subs: RwLock::new(Vec::new()),
            next_sub_id: AtomicU64::new(1),
            processed: AtomicU64::new(0),
            notify: Notify::new(),
        }
    }
}

/// Register a callback for a set of event IDs (spec §4.7 `subEVT`). A
/// given event ID can have at most one subscriber per link — dispatch
/// order across competing subscribers of the same ID is otherwise
/// undefined, so the runtime rejects the ambiguity outright.
pub fn sub_evt(link: &Link, evt_ids: &[EvtId], callback: EvtCallback) -> IocResult<u64> {
    if !link.capabilities.contains(Capabilities::EVT_CONSUMER) {
        return Err(IocError::NotSupported);
    }
    let mut subs = link.evt.subs.write();
    for existing in subs.iter() {
        if existing.evt_ids.iter().any(|id| evt_ids.contains(id)) {
            return Err(IocError::ConflictEventConsumer);
        }
    }
    let id = link.evt.next_sub_id.fetch_add(1, Ordering::Relaxed);
    subs.push(Subscription {
        id,
        evt_ids: evt_ids.to_vec(),
        callback,
    });
    publish_subscriptions(link, &subs);
    Ok(id)
}

pub fn unsub_evt(link: &Link, sub_id: u64) -> IocResult<()> {
    let mut subs = link.evt.subs.write();
    let before = subs.len();
    subs.retain(|s| s.id != sub_id);
    if subs.len() == before {
        return Err(IocError::InvalidParam("no such subscription"));
    }
    publish_subscriptions(link, &subs);
    Ok(())
}

/// Tells the transport the full, current set of EVT IDs this link is
/// subscribed to, so the peer's `post_event` can see it (spec §4.7
/// `NoEventConsumer`). Called with the subscriber table already locked.
fn publish_subscriptions(link: &Link, subs: &[Subscription]) {
    let ids: Vec<u64> = subs.iter().flat_map(|s| s.evt_ids.iter().map(|id| id.packed())).collect();
    link.endpoint.set_local_evt_subscriptions(&ids);
}

pub async fn post_evt(link: &Link, desc: &EvtDesc, opts: &Options) -> IocResult<()> {
    if !link.capabilities.contains(Capabilities::EVT_PRODUCER) {
        return Err(IocError::NotSupported);
    }
    if !link.endpoint.peer_subscribed(desc.evt_id.packed()) {
        return Err(IocError::NoEventConsumer);
    }
    tokio::select! {
        result = link.endpoint.post_event(desc, opts) => result,
        _ = link.state.wait_closed() => Err(IocError::LinkBroken),
    }
}

/// Block until the dispatch loop has processed at least one more event
/// than it had at call time, or the budget elapses.
pub async fn force_proc_evt(link: &Link, opts: &Options) -> IocResult<()> {
    let baseline = link.evt.processed.load(Ordering::Acquire);
    crate::transport::with_budget(opts, IocError::NoData, async {
        loop {
            if link.evt.processed.load(Ordering::Acquire) != baseline {
                return Ok(());
            }
            if link.state.conn() == ConnState::Closed {
                return Err(IocError::LinkBroken);
            }
            link.evt.notify.notified().await;
        }
    })
    .await
}

/// No-op nudge for anything blocked in `force_proc_evt` — dispatch
/// already runs continuously on a worker thread, so there is nothing to
/// actually "wake up" beyond releasing a waiter that is watching for a
/// state it might have missed.
pub fn wakeup_proc_evt(link: &Link) {
    link.evt.notify.notify_waiters();
}

pub(crate) fn spawn_dispatch_loop(link: Arc<Link>) {
    crate::runtime::runtime().spawn(async move {
        loop {
            match link.endpoint.recv_event().await {
                Ok(desc) => {
                    let matching: Vec<EvtCallback> = link
                        .evt
                        .subs
                        .read()
                        .iter()
                        .filter(|s| s.evt_ids.contains(&desc.evt_id))
                        .map(|s| s.callback.clone())
                        .collect();
                    for cb in matching {
                        cb(&desc);
                    }
                    link.evt.processed.fetch_add(1, Ordering::AcqRel);
                    link.evt.notify.notify_waiters();
                }
                Err(_) => {
                    link.evt.notify.notify_waiters();
                    break;
                }
            }
        }
    });
}
