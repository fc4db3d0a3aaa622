//! Connectionless AUTO_LINK event broadcast (spec §3.1 `LinkId::AUTO_LINK`,
//! §9 open question 2 — resolved in `SPEC_FULL.md` §4.7: a single
//! process-wide `tokio::sync::broadcast` channel, capacity
//! `conles_queue_capacity` (1024). A subscriber that falls more than
//! that far behind observes the broadcast channel's own lag signal
//! rather than silently losing events, consistent with
//! `Reliability::MayDrop`.

use crate::config::runtime_config;
use crate::descriptor::EvtDesc;
use crate::error::{IocError, IocResult};
use crate::ids::EvtId;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::broadcast;

pub type EvtCallback = Arc<dyn Fn(&EvtDesc) + Send + Sync>;

struct Subscription {
    id: u64,
    evt_ids: Vec<EvtId>,
    active: Arc<AtomicBool>,
}

struct Conles {
    tx: broadcast::Sender<EvtDesc>,
    subs: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

fn conles() -> &'static Conles {
    static CONLES: OnceLock<Conles> = OnceLock::new();
    CONLES.get_or_init(|| {
        let (tx, _rx) = broadcast::channel(runtime_config().conles_queue_capacity);
        Conles {
            tx,
            subs: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    })
}

/// `postEVT`/`broadcastEVT` against `LinkId::AUTO_LINK` (spec §4.7).
/// With no subscriber registered, this is `NoEventConsumer` rather than
/// a silent no-op — the same contract a connected Link's `postEVT` has
/// when nothing is on the other end.
pub fn broadcast_evt(desc: &EvtDesc) -> IocResult<()> {
    let c = conles();
    let has_subscriber = c.subs.read().iter().any(|s| s.evt_ids.contains(&desc.evt_id));
    if !has_subscriber {
        return Err(IocError::NoEventConsumer);
    }
    c.tx.send(desc.clone()).map(|_| ()).map_err(|_| IocError::NoEventConsumer)
}

/// Same uniqueness rule as a connected Link's `subEVT` (spec §4.7): one
/// event ID can have at most one live subscriber in the connectionless
/// group at a time.
pub fn sub_evt(evt_ids: &[EvtId], callback: EvtCallback) -> IocResult<u64> {
    let c = conles();
    {
        let subs = c.subs.read();
        for existing in subs.iter() {
            if existing.evt_ids.iter().any(|id| evt_ids.contains(id)) {
                return Err(IocError::ConflictEventConsumer);
            }
        }
    }
    let id = c.next_id.fetch_add(1, Ordering::Relaxed);
    let active = Arc::new(AtomicBool::new(true));
    c.subs.write().push(Subscription {
        id,
        evt_ids: evt_ids.to_vec(),
        active: active.clone(),
    });

    let mut rx = c.tx.subscribe();
    let ids = evt_ids.to_vec();
    crate::runtime::runtime().spawn(async move {
        while active.load(Ordering::Acquire) {
            match rx.recv().await {
                Ok(desc) => {
                    if ids.contains(&desc.evt_id) {
                        callback(&desc);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
    Ok(id)
}

pub fn unsub_evt(sub_id: u64) -> IocResult<()> {
    let c = conles();
    let mut subs = c.subs.write();
    let before = subs.len();
    subs.retain(|s| {
        if s.id == sub_id {
            s.active.store(false, Ordering::Release);
            false
        } else {
            true
        }
    });
    if subs.len() == before {
        Err(IocError::InvalidParam("no such subscription"))
    } else {
        Ok(())
    }
}
