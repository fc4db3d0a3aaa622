//! S1 — Single-link EVT round-trip (spec §8.2).
//!
//! Producer posts to a subscribed consumer, the consumer unsubscribes,
//! and a second post against the same event ID observes
//! `NoEventConsumer` rather than silently doing nothing.

use ioc_runtime::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const EVT_TEST_KEEPALIVE: EvtId = EvtId::new(1, 1);

#[test]
fn s1_post_then_unsubscribe_then_post_again() {
    let svc = online_service(
        "fifo://LocalProcess/s1-evt",
        Capabilities::EVT_CONSUMER,
        ServiceFlags::default(),
    )
    .unwrap();
    let server_thread =
        std::thread::spawn(move || accept_client(svc, Capabilities::EVT_CONSUMER, &Options::default()).unwrap());
    let client =
        connect_service("fifo://LocalProcess/s1-evt", Capabilities::EVT_PRODUCER, &Options::default()).unwrap();
    let server = server_thread.join().unwrap();

    let received = Arc::new(AtomicU32::new(0));
    let received2 = received.clone();
    let sub = sub_evt(
        server,
        &[EVT_TEST_KEEPALIVE],
        Arc::new(move |_d| {
            received2.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    post_evt(client, &EvtDesc::new(EVT_TEST_KEEPALIVE), &Options::default()).unwrap();
    force_proc_evt(server, &Options::timeout(Duration::from_millis(200))).unwrap();
    assert_eq!(received.load(Ordering::SeqCst), 1);

    unsub_evt(server, sub).unwrap();

    let res = post_evt(client, &EvtDesc::new(EVT_TEST_KEEPALIVE), &Options::default());
    assert_eq!(res.unwrap_err(), IocError::NoEventConsumer);
    assert_eq!(received.load(Ordering::SeqCst), 1);

    close_link(client).unwrap();
    close_link(server).unwrap();
    offline_service(svc).unwrap();
}
