use linestat::{Client, ClientOptions, Network, StatsdError, TagFormat};
use std::collections::HashSet;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

// ============================================================================
// Helper functions to reduce test code duplication
// ============================================================================

/// Binds a receiver on an ephemeral port and collects datagrams until it goes quiet.
fn spawn_udp_receiver() -> (String, JoinHandle<Vec<String>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("couldn't bind to address");
    let address = socket.local_addr().unwrap().to_string();
    let handle = std::thread::spawn(move || {
        socket
            .set_read_timeout(Some(Duration::from_millis(500)))
            .expect("set_read_timeout failed");
        let mut buf = [0; 10000];
        let mut received = Vec::<String>::new();

        while let Ok((number_of_bytes, _)) = socket.recv_from(&mut buf) {
            let filled_buf = &buf[..number_of_bytes];
            received.push(String::from_utf8(filled_buf.to_vec()).unwrap());
        }
        received
    });
    (address, handle)
}

/// Creates a UDP client with the given configuration.
fn create_client(address: String, max_packet_size: usize, tag_format: TagFormat) -> Client {
    Client::new(ClientOptions {
        address,
        network: Network::Udp,
        max_packet_size,
        flush_period: Duration::from_millis(20),
        tag_format,
        udp_check: false,
        ..Default::default()
    })
    .unwrap()
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn test_udp_packets_drop_trailing_newline() {
    let (address, receiver) = spawn_udp_receiver();
    let client = create_client(address, 1440, TagFormat::None);

    client.increment("some.counter");
    client.gauge("some.gauge", 12);
    client.close().unwrap();

    let received = receiver.join().unwrap();
    assert_eq!(received, vec!["some.counter:1|c\nsome.gauge:12|g".to_string()]);
}

#[test]
fn test_udp_packets_respect_size_and_never_split_lines() {
    let (address, receiver) = spawn_udp_receiver();
    let client = create_client(address, 64, TagFormat::None);

    for i in 0..100 {
        client.count("packet.metric", i);
    }
    client.close().unwrap();

    let received = receiver.join().unwrap();
    assert!(received.len() > 1);

    let mut seen = HashSet::new();
    for packet in &received {
        // the trailing newline is trimmed, so a full packet plus it may be one line over
        assert!(!packet.ends_with('\n'));
        for line in packet.split('\n') {
            let value = line
                .strip_prefix("packet.metric:")
                .and_then(|rest| rest.strip_suffix("|c"))
                .unwrap_or_else(|| panic!("broken line {line:?}"));
            assert!(seen.insert(value.parse::<u32>().unwrap()));
        }
    }
    assert_eq!(seen.len(), 100);
}

#[test]
fn test_udp_periodic_flush() {
    let (address, receiver) = spawn_udp_receiver();
    let client = create_client(address, 1440, TagFormat::InfluxDB);

    client.timing("slow.op", 250);
    std::thread::sleep(Duration::from_millis(200));

    let received = receiver.join().unwrap();
    assert_eq!(received, vec!["slow.op:250|ms".to_string()]);
    client.close().unwrap();
}

#[test]
fn test_udp_tags_in_both_formats() {
    for (tag_format, expected) in [
        (TagFormat::InfluxDB, "api.hits,env=prod:1|c"),
        (TagFormat::Datadog, "api.hits:1|c|#env:prod"),
    ] {
        let (address, receiver) = spawn_udp_receiver();
        let client = Client::new(
            ClientOptions {
                address,
                tag_format,
                udp_check: false,
                ..Default::default()
            }
            .with_prefix("api")
            .with_tag_pairs(&["env", "prod"])
            .unwrap(),
        )
        .unwrap();

        client.increment("hits");
        client.close().unwrap();
        assert_eq!(receiver.join().unwrap(), vec![expected.to_string()]);
    }
}

#[test]
fn test_udp_check_passes_with_listener() {
    let (address, receiver) = spawn_udp_receiver();
    let client = Client::new(ClientOptions {
        address,
        udp_check: true,
        ..Default::default()
    })
    .unwrap();
    client.increment("checked");
    client.close().unwrap();

    let received = receiver.join().unwrap();
    // two empty probe datagrams precede the metrics
    assert_eq!(received, vec![String::new(), String::new(), "checked:1|c".to_string()]);
}

#[test]
fn test_error_handler_sees_send_failures() {
    // A receiver that closes right away leaves the port unreachable.
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    let address = socket.local_addr().unwrap().to_string();
    drop(socket);

    let errors: Arc<Mutex<Vec<String>>> = Arc::default();
    let seen = errors.clone();
    let client = Client::new(ClientOptions {
        address,
        udp_check: false,
        inline_flush: true,
        error_handler: Some(Arc::new(move |err: &StatsdError| {
            seen.lock().unwrap().push(err.to_string());
        })),
        ..Default::default()
    })
    .unwrap();

    // ICMP unreachable is reported on a later send, never to the caller
    for _ in 0..10 {
        client.increment("lost");
        std::thread::sleep(Duration::from_millis(10));
    }
    client.close().unwrap();

    if cfg!(target_os = "linux") {
        assert!(!errors.lock().unwrap().is_empty());
    }
}
