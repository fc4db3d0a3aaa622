//! Connectionless `AUTO_LINK` event broadcast: fan-out with no
//! connect/accept step at all (spec §4.7).

use ioc_runtime::*;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn conles_broadcast_reaches_subscriber_and_rejects_conflict() {
    let evt_id = EvtId::new(1, 555);
    let received = Arc::new(AtomicU32::new(0));
    let received2 = received.clone();
    let sub_a = sub_evt(
        LinkId::AUTO_LINK,
        &[evt_id],
        Arc::new(move |_d| {
            received2.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    // Same evt_id from a second subscriber is a conflict, same as on a
    // connected Link (subscription uniqueness applies uniformly to
    // AUTO_LINK, spec §4.7).
    let sub_b = sub_evt(LinkId::AUTO_LINK, &[evt_id], Arc::new(|_d| {}));
    assert!(sub_b.is_err());

    std::thread::sleep(Duration::from_millis(20));
    broadcast_evt(&EvtDesc::new(evt_id)).unwrap();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(received.load(Ordering::SeqCst), 1);

    unsub_evt(LinkId::AUTO_LINK, sub_a).unwrap();
}

#[test]
fn broadcast_with_no_subscriber_is_rejected() {
    let evt_id = EvtId::new(1, 556);
    let res = broadcast_evt(&EvtDesc::new(evt_id));
    assert_eq!(res.unwrap_err(), IocError::NoEventConsumer);
}
