/*!
 * Accept Mode Tests
 * Blocking and non-blocking accept on one listening descriptor
 */

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use os_operator::socket::*;
use os_operator::{classify, ErrorClass};
use serial_test::serial;
use std::time::{Duration, Instant};

fn listening_server(options: SocketOptions) -> (ServerOperator<UnixSocketBackend>, u16) {
    let mut server = ServerOperator::with_options(UnixSocketBackend::new(), options).unwrap();
    server.listen(0, 16).unwrap();
    let port = server.local_port().unwrap();
    (server, port)
}

fn accept_pending(server: &mut ServerOperator<UnixSocketBackend>) -> SocketEndpoint {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        match server.accept_non_blocking() {
            Ok(conn) => return conn,
            Err(e) if e.is_would_block() && Instant::now() < deadline => {
                std::thread::sleep(Duration::from_millis(5));
            }
            Err(e) => panic!("non-blocking accept failed: {}", e),
        }
    }
}

fn nonblocking_flag(server: &ServerOperator<UnixSocketBackend>) -> bool {
    let fd = server.endpoint().descriptor().unwrap();
    let bits = fcntl(fd, FcntlArg::F_GETFL).unwrap();
    OFlag::from_bits_truncate(bits).contains(OFlag::O_NONBLOCK)
}

#[test]
#[serial]
fn test_non_blocking_accept_without_pending() {
    let (mut server, _port) = listening_server(SocketOptions::default());

    let started = Instant::now();
    let result = server.accept_non_blocking();
    assert!(started.elapsed() < Duration::from_millis(500));

    let err = result.as_ref().unwrap_err();
    assert!(err.is_would_block());
    assert_eq!(classify(&result), ErrorClass::GenericFailure);
    assert_eq!(server.state(), EndpointState::Listening);
    assert!(nonblocking_flag(&server));
}

#[test]
#[serial]
fn test_non_blocking_accept_with_pending() {
    let (mut server, port) = listening_server(SocketOptions::default());
    let mut client = ClientOperator::native().unwrap();
    client.connect("127.0.0.1", port).unwrap();

    let conn = accept_pending(&mut server);
    assert!(conn.is_open());
    assert_eq!(server.accept_mode(), Some(AcceptMode::NonBlocking));

    client.send(b"ok").unwrap();
    let mut buf = [0u8; 2];
    let mut got = 0;
    while got < 2 {
        got += server.recv(&conn, &mut buf[got..]).unwrap();
    }
    assert_eq!(&buf, b"ok");
}

#[test]
#[serial]
fn test_modes_alternate_on_same_descriptor() {
    let (mut server, port) = listening_server(SocketOptions::default());

    assert!(server.accept_non_blocking().unwrap_err().is_would_block());
    assert!(nonblocking_flag(&server));

    let mut client = ClientOperator::native().unwrap();
    client.connect("127.0.0.1", port).unwrap();

    let conn = server.accept_blocking().unwrap();
    assert!(conn.is_open());
    assert!(!nonblocking_flag(&server));
    assert_eq!(server.accept_mode(), Some(AcceptMode::Blocking));

    assert!(server.accept_non_blocking().unwrap_err().is_would_block());
}

#[test]
#[serial]
fn test_reuse_address_rebinds_port() {
    let options = SocketOptions::default().with_reuse_address(true);
    let (mut server, port) = listening_server(options);

    let mut client = ClientOperator::native().unwrap();
    client.connect("127.0.0.1", port).unwrap();
    let mut conn = server.accept_blocking().unwrap();

    // Server closes first, leaving the port in TIME_WAIT
    server.close_connection(&mut conn).unwrap();
    server.close().unwrap();
    client.close().unwrap();

    let mut again = ServerOperator::with_options(UnixSocketBackend::new(), options).unwrap();
    again.listen(port, 16).unwrap();
    assert_eq!(again.local_port().unwrap(), port);
    assert!(again.options().reuse_address);
}
