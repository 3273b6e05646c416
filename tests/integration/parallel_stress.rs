use linestat::{Client, ClientOptions, MetricResult, Writer};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Clone, Default)]
struct CollectingWriter {
    packets: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl Writer for CollectingWriter {
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        self.packets.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    fn close(&mut self) -> MetricResult<()> {
        Ok(())
    }
}

fn create_test_client(writer: &CollectingWriter) -> Client {
    Client::new(ClientOptions {
        writer: Some(Box::new(writer.clone())),
        max_packet_size: 512,
        flush_period: Duration::from_millis(5),
        ..Default::default()
    })
    .unwrap()
}

#[test]
fn test_parallel_mixed_metrics_stress() {
    let writer = CollectingWriter::default();
    let client = Arc::new(create_test_client(&writer));
    let num_threads = 8;
    let iterations_per_thread = 2_000;

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let client = Arc::clone(&client);
            thread::spawn(move || {
                for i in 0..iterations_per_thread {
                    client.count("parallel.count", 1);
                    client.gauge("parallel.gauge", i - 1000);
                    client.timing("parallel.timing", thread_id);
                    client.unique("parallel.set", &format!("user{i}"));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    client.close().unwrap();

    let packets = writer.packets.lock().unwrap();
    let mut counts = 0;
    let mut gauges = 0;
    for packet in packets.iter() {
        let text = std::str::from_utf8(packet).unwrap();
        assert!(text.ends_with('\n'), "packet split a line: {text:?}");
        for line in text.lines() {
            match line.split_once(':').map(|(name, _)| name) {
                Some("parallel.count") => counts += 1,
                Some("parallel.gauge") => gauges += 1,
                Some("parallel.timing" | "parallel.set") => {}
                _ => panic!("corrupted line {line:?}"),
            }
        }
    }

    assert_eq!(counts, num_threads * iterations_per_thread);
    // 1000 negative values per thread are written twice
    assert_eq!(gauges, num_threads * (iterations_per_thread + 1000));
}

#[test]
fn test_parallel_clones_share_buffer() {
    let writer = CollectingWriter::default();
    let client = create_test_client(&writer);

    let handles: Vec<_> = (0..4)
        .map(|thread_id| {
            let client = client
                .clone_with(linestat::CloneOptions {
                    prefix: Some(format!("worker{thread_id}")),
                    ..Default::default()
                })
                .unwrap();
            thread::spawn(move || {
                for _ in 0..1_000 {
                    client.increment("jobs");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }
    client.close().unwrap();

    let text: String = writer
        .packets
        .lock()
        .unwrap()
        .iter()
        .map(|p| String::from_utf8_lossy(p).into_owned())
        .collect();
    for thread_id in 0..4 {
        let line = format!("worker{thread_id}.jobs:1|c\n");
        assert_eq!(text.matches(line.as_str()).count(), 1_000);
    }
}
