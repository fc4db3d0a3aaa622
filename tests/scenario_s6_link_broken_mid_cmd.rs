//! S6 — a Link closed mid-`exec_cmd` wakes the blocked call with
//! `LinkBroken` promptly, rather than letting it run out its own timeout
//! budget or hang (spec §8.2).

use ioc_runtime::*;
use std::sync::Arc;
use std::time::Duration;

const CMD_TEST_SLOW: CmdId = CmdId::new(1, 3);

#[test]
fn s6_close_link_during_exec_cmd_yields_link_broken() {
    let svc = online_service(
        "fifo://LocalProcess/s6-cmd",
        Capabilities::CMD_EXECUTOR,
        ServiceFlags::default(),
    )
    .unwrap();
    let server_thread =
        std::thread::spawn(move || accept_client(svc, Capabilities::CMD_EXECUTOR, &Options::default()).unwrap());
    let client =
        connect_service("fifo://LocalProcess/s6-cmd", Capabilities::CMD_INITIATOR, &Options::default()).unwrap();
    let server = server_thread.join().unwrap();

    register_cmd_executor(
        server,
        &[CMD_TEST_SLOW],
        Arc::new(|req: &CmdDesc| {
            std::thread::sleep(Duration::from_millis(1000));
            let mut reply = req.clone();
            reply.complete_success(b"late");
            reply
        }),
    )
    .unwrap();

    let closer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(150));
        close_link(client).unwrap();
    });

    let start = std::time::Instant::now();
    let res = exec_cmd(
        client,
        CmdDesc::new(CMD_TEST_SLOW),
        &Options::timeout(Duration::from_millis(3000)),
    );
    let elapsed = start.elapsed();
    closer.join().unwrap();

    assert_eq!(res.unwrap_err(), IocError::LinkBroken);
    assert!(elapsed < Duration::from_millis(900), "took {elapsed:?}, wanted a prompt wakeup");

    close_link(server).unwrap();
    offline_service(svc).unwrap();

    assert_eq!(get_link_state(client).unwrap_err(), IocError::NotExistLink);
    assert_eq!(get_link_state(server).unwrap_err(), IocError::NotExistLink);
}
