//! S5 — DAT backpressure under `NoDrop`/BLOCKING (spec §8.2). Chunk
//! count exceeds the fixed FIFO queue depth (64, `config.rs`) so sends
//! genuinely have to block on a slow receiver; the per-chunk delay is
//! scaled down from the spec's 100ms to keep the suite fast while still
//! forcing backpressure.

use ioc_runtime::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const CHUNK_COUNT: usize = 80;
const RECV_DELAY: Duration = Duration::from_millis(15);

#[test]
fn s5_slow_receiver_never_surfaces_buffer_full_under_blocking() {
    let svc = online_service(
        "fifo://LocalProcess/s5-dat",
        Capabilities::DAT_RECEIVER,
        ServiceFlags::default(),
    )
    .unwrap();
    let server_thread =
        std::thread::spawn(move || accept_client(svc, Capabilities::DAT_RECEIVER, &Options::default()).unwrap());
    let client =
        connect_service("fifo://LocalProcess/s5-dat", Capabilities::DAT_SENDER, &Options::default()).unwrap();
    let server = server_thread.join().unwrap();

    let order = Arc::new(Mutex::new(Vec::with_capacity(CHUNK_COUNT)));
    let count = Arc::new(AtomicUsize::new(0));
    let (order2, count2) = (order.clone(), count.clone());
    register_dat_receiver(
        server,
        Arc::new(move |chunk: &DatDesc| {
            std::thread::sleep(RECV_DELAY);
            order2.lock().unwrap().push(chunk.payload.as_slice()[0]);
            count2.fetch_add(1, Ordering::SeqCst);
        }),
    )
    .unwrap();

    let start = std::time::Instant::now();
    for i in 0..CHUNK_COUNT {
        let payload = [i as u8; 64];
        send_dat(client, &DatDesc::new(&payload), &Options::default().no_drop()).unwrap();
    }
    let send_elapsed = start.elapsed();

    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while count.load(Ordering::SeqCst) < CHUNK_COUNT && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(count.load(Ordering::SeqCst), CHUNK_COUNT);
    let received: Vec<u8> = order.lock().unwrap().clone();
    let expected: Vec<u8> = (0..CHUNK_COUNT as u8).collect();
    assert_eq!(received, expected, "chunks must arrive strictly in order");

    // Sending every chunk blocked on backpressure rather than returning
    // immediately, since CHUNK_COUNT exceeds the fixed queue depth.
    assert!(send_elapsed >= RECV_DELAY * (CHUNK_COUNT as u32 - 64));

    close_link(client).unwrap();
    close_link(server).unwrap();
    offline_service(svc).unwrap();
}
