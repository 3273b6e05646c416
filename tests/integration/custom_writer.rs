use linestat::{Client, ClientOptions, Conn, ConnConfig, MetricResult, TagFormat, Writer};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A custom writer that collects packets instead of sending them.
#[derive(Clone, Default)]
pub struct TestWriter {
    packets: Arc<Mutex<Vec<String>>>,
    closed: Arc<Mutex<u32>>,
}

impl TestWriter {
    pub fn get_all_metrics_as_text(&self) -> String {
        self.packets.lock().unwrap().join("")
    }

    pub fn packets(&self) -> Vec<String> {
        self.packets.lock().unwrap().clone()
    }
}

impl Writer for TestWriter {
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        self.packets
            .lock()
            .unwrap()
            .push(String::from_utf8(buf.to_vec()).unwrap());
        Ok(buf.len())
    }

    fn close(&mut self) -> MetricResult<()> {
        *self.closed.lock().unwrap() += 1;
        Ok(())
    }
}

// ============================================================================
// Tests for Custom Writer
// ============================================================================

#[test]
fn test_custom_writer_basic() {
    let writer = TestWriter::default();
    let client = Client::new(ClientOptions {
        writer: Some(Box::new(writer.clone())),
        flush_period: Duration::from_millis(20),
        tag_format: TagFormat::Datadog,
        tags: vec![linestat::Tag::new("host", "server1")],
        ..Default::default()
    })
    .unwrap();

    client.count("custom.counter", 42);
    client.gauge("custom.gauge", 100);
    client.histogram("custom.histogram", 250);
    client.timing("custom.timing", 7.5f64);

    // Wait for flush
    std::thread::sleep(Duration::from_millis(150));

    let metrics = writer.get_all_metrics_as_text();
    assert_eq!(
        metrics,
        "custom.counter:42|c|#host:server1\ncustom.gauge:100|g|#host:server1\n\
         custom.histogram:250|h|#host:server1\ncustom.timing:7.5|ms|#host:server1\n"
    );
    assert_eq!(*writer.closed.lock().unwrap(), 0);

    client.close().unwrap();
    assert_eq!(*writer.closed.lock().unwrap(), 1);
}

#[test]
fn test_custom_writer_keeps_trailing_newline() {
    let writer = TestWriter::default();
    let client = Client::new(ClientOptions {
        writer: Some(Box::new(writer.clone())),
        ..Default::default()
    })
    .unwrap();

    client.count("test_key", 5);
    client.close().unwrap();

    assert_eq!(writer.packets(), vec!["test_key:5|c\n".to_string()]);
    assert_eq!(*writer.closed.lock().unwrap(), 1);
}

#[test]
fn test_conn_used_directly() {
    let writer = TestWriter::default();
    let conn = Conn::new(
        ConnConfig {
            max_packet_size: 10,
            flush_period: Duration::ZERO,
            ..Default::default()
        },
        Box::new(writer.clone()),
    )
    .unwrap();

    conn.count("", "a", 1, 1.0, "");
    conn.count("", "bb", 2, 1.0, "");
    assert_eq!(writer.packets(), vec!["a:1|c\n".to_string()]);

    conn.close().unwrap();
    assert_eq!(
        writer.packets(),
        vec!["a:1|c\n".to_string(), "bb:2|c\n".to_string()]
    );
}

#[test]
fn test_large_packet_flushes_on_size() {
    let writer = TestWriter::default();
    let client = Client::new(ClientOptions {
        writer: Some(Box::new(writer.clone())),
        max_packet_size: 100,
        flush_period: Duration::ZERO,
        ..Default::default()
    })
    .unwrap();

    for i in 0..50 {
        client.count("large.packet.metric", i);
    }

    let packets = writer.packets();
    assert!(!packets.is_empty());
    for packet in &packets {
        // within the limit, except for at most one metric over it
        assert!(packet.len() <= 100);
        assert!(packet.ends_with('\n'));
    }
    client.close().unwrap();
}
