//! S7 — dynamic resubscription on the same Link (spec §8.2): unsubscribe
//! from one event ID, subscribe to another, and confirm the runtime
//! routes by the live subscription set rather than anything cached from
//! the first one.

use ioc_runtime::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const EVT_A: EvtId = EvtId::new(1, 10);
const EVT_B: EvtId = EvtId::new(1, 11);

#[test]
fn s7_unsubscribe_a_then_subscribe_b_routes_b_and_rejects_a() {
    let svc = online_service(
        "fifo://LocalProcess/s7-evt",
        Capabilities::EVT_CONSUMER,
        ServiceFlags::default(),
    )
    .unwrap();
    let server_thread =
        std::thread::spawn(move || accept_client(svc, Capabilities::EVT_CONSUMER, &Options::default()).unwrap());
    let client =
        connect_service("fifo://LocalProcess/s7-evt", Capabilities::EVT_PRODUCER, &Options::default()).unwrap();
    let server = server_thread.join().unwrap();

    let hits_a = Arc::new(AtomicU32::new(0));
    let hits_a2 = hits_a.clone();
    let sub_a = sub_evt(server, &[EVT_A], Arc::new(move |_d| { hits_a2.fetch_add(1, Ordering::SeqCst); })).unwrap();

    post_evt(client, &EvtDesc::new(EVT_A), &Options::default()).unwrap();
    force_proc_evt(server, &Options::timeout(Duration::from_millis(200))).unwrap();
    assert_eq!(hits_a.load(Ordering::SeqCst), 1);

    unsub_evt(server, sub_a).unwrap();

    let hits_b = Arc::new(AtomicU32::new(0));
    let hits_b2 = hits_b.clone();
    sub_evt(server, &[EVT_B], Arc::new(move |_d| { hits_b2.fetch_add(1, Ordering::SeqCst); })).unwrap();

    post_evt(client, &EvtDesc::new(EVT_B), &Options::default()).unwrap();
    force_proc_evt(server, &Options::timeout(Duration::from_millis(200))).unwrap();
    assert_eq!(hits_b.load(Ordering::SeqCst), 1);

    let res = post_evt(client, &EvtDesc::new(EVT_A), &Options::default());
    assert_eq!(res.unwrap_err(), IocError::NoEventConsumer);
    assert_eq!(hits_a.load(Ordering::SeqCst), 1);

    close_link(client).unwrap();
    close_link(server).unwrap();
    offline_service(svc).unwrap();
}
