//! S4 — DAT large-payload integrity via the callback-mode receiver
//! (spec §8.2).

use ioc_runtime::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn s4_one_mib_chunk_round_trips_through_callback() {
    let svc = online_service(
        "fifo://LocalProcess/s4-dat",
        Capabilities::DAT_RECEIVER,
        ServiceFlags::default(),
    )
    .unwrap();
    let server_thread =
        std::thread::spawn(move || accept_client(svc, Capabilities::DAT_RECEIVER, &Options::default()).unwrap());
    let client =
        connect_service("fifo://LocalProcess/s4-dat", Capabilities::DAT_SENDER, &Options::default()).unwrap();
    let server = server_thread.join().unwrap();

    let pattern: Vec<u8> = (0..1_048_576usize).map(|i| (i % 256) as u8).collect();

    let received_len = Arc::new(AtomicUsize::new(0));
    let matches = Arc::new(AtomicBool::new(false));
    let saw_busy_cb = Arc::new(AtomicBool::new(false));
    let (len2, matches2, busy2) = (received_len.clone(), matches.clone(), saw_busy_cb.clone());
    let expected = pattern.clone();

    register_dat_receiver(
        server,
        Arc::new(move |chunk: &DatDesc| {
            len2.store(chunk.payload.as_slice().len(), Ordering::SeqCst);
            matches2.store(chunk.payload.as_slice() == expected.as_slice(), Ordering::SeqCst);
            if get_link_state(server).unwrap().dat_receiver == DatReceiverState::BusyCbRecvDat {
                busy2.store(true, Ordering::SeqCst);
            }
        }),
    )
    .unwrap();

    send_dat(client, &DatDesc::new(&pattern), &Options::default()).unwrap();

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while received_len.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(received_len.load(Ordering::SeqCst), 1_048_576);
    assert!(matches.load(Ordering::SeqCst));
    assert!(saw_busy_cb.load(Ordering::SeqCst));

    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(
        get_link_state(server).unwrap().dat_receiver,
        DatReceiverState::Ready
    );

    close_link(client).unwrap();
    close_link(server).unwrap();
    offline_service(svc).unwrap();
}
