use linestat::{Client, ClientOptions, SafeConn, StatsdError, DEFAULT_READ_TIMEOUT};
use std::io::Read;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn guarded_client(listener: &TcpListener, errors: Arc<Mutex<Vec<bool>>>) -> Client {
    let address = listener.local_addr().unwrap().to_string();
    let conn = SafeConn::connect(&address, Duration::from_secs(1), DEFAULT_READ_TIMEOUT).unwrap();

    Client::new(ClientOptions {
        writer: Some(Box::new(conn)),
        flush_period: Duration::ZERO,
        error_handler: Some(Arc::new(move |err: &StatsdError| {
            errors.lock().unwrap().push(err.is_connection_closed());
        })),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_guarded_tcp_keeps_newlines_and_batches() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let errors = Arc::default();
    let client = guarded_client(&listener, Arc::clone(&errors));
    let (mut server, _) = listener.accept().unwrap();

    client.increment("tcp.count");
    client.histogram("tcp.size", 512);
    client.flush();
    client.unique("tcp.user", "carol");
    client.close().unwrap();

    let mut received = String::new();
    server.read_to_string(&mut received).unwrap();
    assert_eq!(received, "tcp.count:1|c\ntcp.size:512|h\ntcp.user:carol|s\n");
    assert!(errors.lock().unwrap().is_empty());
}

#[test]
fn test_guarded_tcp_reports_closed_peer() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let errors: Arc<Mutex<Vec<bool>>> = Arc::default();
    let client = guarded_client(&listener, Arc::clone(&errors));
    let (server, _) = listener.accept().unwrap();
    drop(server);

    // keep flushing until the hang up has reached us
    let deadline = Instant::now() + Duration::from_secs(2);
    while errors.lock().unwrap().is_empty() {
        assert!(Instant::now() < deadline, "closed peer was never reported");
        client.increment("lost");
        client.flush();
        std::thread::sleep(Duration::from_millis(10));
    }

    assert!(errors.lock().unwrap().iter().all(|closed| *closed));
    client.close().ok();
}
