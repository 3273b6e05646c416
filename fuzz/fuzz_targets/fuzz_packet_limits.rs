#![no_main]

use libfuzzer_sys::fuzz_target;
use linestat::{Conn, ConnConfig, MetricResult, Writer};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Packets(Arc<Mutex<Vec<Vec<u8>>>>);

impl Writer for Packets {
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        self.0.lock().unwrap().push(buf.to_vec());
        Ok(buf.len())
    }

    fn close(&mut self) -> MetricResult<()> {
        Ok(())
    }
}

// Fuzz target focusing on packet size limits and edge cases
fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }

    // Use first 2 bytes to determine packet size, 0 included
    let packet_size = usize::from(u16::from_le_bytes([data[0], data[1]]) % 2048);
    let inline_flush = data[2] & 1 == 1;

    let packets = Packets::default();
    let conn = Conn::new(
        ConnConfig {
            max_packet_size: packet_size,
            flush_period: Duration::ZERO,
            inline_flush,
            ..Default::default()
        },
        Box::new(packets.clone()),
    )
    .unwrap();

    // Bucket names of fuzzed lengths, without the characters that delimit a line
    let mut sent = 0;
    for chunk in data[3..].chunks(7) {
        let name: String = chunk
            .iter()
            .map(|b| char::from(b'a' + b % 26))
            .collect();
        let bucket = name.repeat(usize::from(chunk[0] % 32) + 1);
        conn.count("", &bucket, 1, 1.0, "");
        sent += 1;
    }
    conn.close().unwrap();

    let packets = packets.0.lock().unwrap();
    let mut lines = 0;
    for packet in packets.iter() {
        assert!(!packet.is_empty());
        assert_eq!(packet.last(), Some(&b'\n'), "packet split a line");
        let text = std::str::from_utf8(packet).unwrap();
        let count = text.lines().count();
        // only a single line may exceed the limit on its own
        if packet_size > 0 && packet.len() > packet_size {
            assert_eq!(count, 1);
        }
        lines += count;
    }
    assert_eq!(lines, sent);
});
