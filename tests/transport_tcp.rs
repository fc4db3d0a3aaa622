//! TCP loopback transport carries the same CMD round trip as FIFO,
//! proving the discipline layer is transport-independent (spec §4.4).

use ioc_runtime::*;

#[test]
fn tcp_transport_carries_cmd_round_trip() {
    let svc =
        online_service("tcp://127.0.0.1:28717/tcp-cmd", Capabilities::CMD_EXECUTOR, ServiceFlags::default()).unwrap();
    let server_thread =
        std::thread::spawn(move || accept_client(svc, Capabilities::CMD_EXECUTOR, &Options::default()).unwrap());
    let client =
        connect_service("tcp://127.0.0.1:28717/tcp-cmd", Capabilities::CMD_INITIATOR, &Options::default()).unwrap();
    let server = server_thread.join().unwrap();

    let executor = std::thread::spawn(move || {
        let mut req = wait_cmd(server, &Options::default()).unwrap();
        req.complete_success(b"PONG");
        ack_cmd(server, &req).unwrap();
    });
    let reply = exec_cmd(
        client,
        CmdDesc::new(CmdId::new(1, 1)).with_input(b"PING"),
        &Options::default(),
    )
    .unwrap();
    executor.join().unwrap();
    assert_eq!(reply.out_payload.as_slice(), b"PONG");

    close_link(client).unwrap();
    close_link(server).unwrap();
    offline_service(svc).unwrap();
}

#[test]
fn tcp_connect_refused_when_nothing_listens() {
    let res = connect_service("tcp://127.0.0.1:28718/ghost", Capabilities::CMD_INITIATOR, &Options::default());
    assert!(res.is_err());
}
