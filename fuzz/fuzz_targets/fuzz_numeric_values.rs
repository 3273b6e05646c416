#![no_main]

use libfuzzer_sys::fuzz_target;
use linestat::{Conn, ConnConfig, MetricResult, Writer};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Writer for Capture {
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn close(&mut self) -> MetricResult<()> {
        Ok(())
    }
}

// Fuzz target focusing on numeric edge cases
fuzz_target!(|data: &[u8]| {
    if data.len() < 16 {
        return;
    }

    let capture = Capture::default();
    let conn = Conn::new(
        ConnConfig {
            flush_period: Duration::ZERO,
            ..Default::default()
        },
        Box::new(capture.clone()),
    )
    .unwrap();

    let raw1 = u64::from_le_bytes(data[0..8].try_into().unwrap());
    let raw2 = u64::from_le_bytes(data[8..16].try_into().unwrap());
    let int = raw1 as i64;
    let float = f64::from_bits(raw2);

    conn.count("", "fuzz.counter", int, 1.0, "");
    conn.gauge("", "fuzz.gauge", float, "");
    conn.gauge_relative("", "fuzz.delta", int, "");
    conn.gauge_relative("", "fuzz.fdelta", float, "");
    conn.histogram("", "fuzz.histogram", raw1, 1.0, "");
    conn.timing("", "fuzz.timing", f32::from_bits(raw2 as u32), 1.0, "");
    conn.close().unwrap();

    let out = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    for line in out.lines() {
        let (_, rest) = line.split_once(':').unwrap();
        let (value, _) = rest.split_once('|').unwrap();
        assert!(!value.is_empty());
        assert!(!value.contains('e'), "exponent in {line}");
    }
});
