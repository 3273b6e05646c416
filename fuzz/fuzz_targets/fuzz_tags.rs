#![no_main]

use libfuzzer_sys::fuzz_target;
use linestat::{Client, ClientOptions, MetricResult, Tag, TagFormat, Writer};
use std::time::Duration;

struct Discard;

impl Writer for Discard {
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        Ok(buf.len())
    }

    fn close(&mut self) -> MetricResult<()> {
        Ok(())
    }
}

// Fuzz target focusing on edge cases in tags
fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }

    // Split the data into chunks to create key/value pairs
    let text = String::from_utf8_lossy(&data[1..]).to_string();
    let chunks: Vec<&str> = text.split('\0').collect();
    let tags: Vec<Tag> = chunks
        .chunks(2)
        .map(|pair| Tag::new(pair[0], pair.get(1).copied().unwrap_or("")))
        .collect();

    let tag_format = match data[0] % 3 {
        0 => TagFormat::None,
        1 => TagFormat::InfluxDB,
        _ => TagFormat::Datadog,
    };

    let client = Client::new(ClientOptions {
        writer: Some(Box::new(Discard)),
        flush_period: Duration::ZERO,
        max_packet_size: 256,
        tag_format,
        tags: tags.clone(),
        ..Default::default()
    })
    .unwrap();

    let joined = tag_format.join(&tags);
    let split = tag_format.split(&joined);
    if tag_format == TagFormat::None {
        assert!(split.is_empty());
    }

    let child = client
        .clone_with(linestat::CloneOptions {
            tags: split,
            ..Default::default()
        })
        .unwrap();
    child.increment("fuzz.metric");
    child.gauge("fuzz.gauge", -42);
    child.histogram("fuzz.histogram", 100);
    client.close().unwrap();
});
