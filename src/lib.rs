//! # linestat
//!
//! A buffered StatsD client for Rust.
//!
//! ## Features
//!
//! - **Batching**: metrics are packed into packets up to a size limit, a packet never splits a line
//! - **Background Flush**: a flush thread empties the buffer on a fixed period
//! - **Tag Formats**: InfluxDB (`bucket,k=v:1|c`) and Datadog (`bucket:1|c|#k:v`)
//! - **Metric Types**: Counters, Gauges (absolute and relative), Timings, Histograms and Sets
//! - **Dead Peer Detection**: [`SafeConn`] fails fast on a TCP peer that hung up
//!
//! ## Quick Start
//!
//! ```no_run
//! use linestat::{Client, ClientOptions, TagFormat};
//! use std::time::Duration;
//!
//! let options = ClientOptions {
//!     address: "127.0.0.1:8125".to_string(),
//!     max_packet_size: 1432,
//!     flush_period: Duration::from_millis(100),
//!     tag_format: TagFormat::Datadog,
//!     ..Default::default()
//! }
//! .with_prefix("myapp")
//! .with_tag_pairs(&["env", "prod"])?;
//!
//! let client = Client::new(options)?;
//! client.increment("request.count");
//! client.timing("request.latency", 42);
//! client.gauge("connections.active", 100);
//! client.unique("users", "alice");
//! client.close()?;
//! # Ok::<(), linestat::StatsdError>(())
//! ```
//!
//! Over TCP, wrap the stream in [`SafeConn`] and hand it over as the writer:
//!
//! ```no_run
//! use linestat::{Client, ClientOptions, SafeConn};
//!
//! let conn = SafeConn::connect_with_default_timeouts("127.0.0.1:8125")?;
//! let client = Client::new(ClientOptions {
//!     writer: Some(Box::new(conn)),
//!     ..Default::default()
//! })?;
//! client.increment("request.count");
//! # Ok::<(), linestat::StatsdError>(())
//! ```

#![deny(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![warn(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

// https://github.com/statsd/statsd/blob/master/docs/metric_types.md
mod error;
mod statsd;

pub use error::StatsdError;
pub use statsd::client::{Client, Timing};
pub use statsd::conn::{Conn, ConnConfig};
pub use statsd::options::{
    tag_pairs, ClientOptions, CloneOptions, ErrorHandler, Network, DEFAULT_ADDRESS,
    DEFAULT_FLUSH_PERIOD, DEFAULT_MAX_PACKET_SIZE,
};
pub use statsd::safe_conn::{DuplexStream, SafeConn, DEFAULT_CONN_TIMEOUT, DEFAULT_READ_TIMEOUT};
pub use statsd::tags::{merge_tags, Tag, TagFormat};
pub use statsd::writer::Writer;
pub use statsd::Number;

/// Result type for client construction and teardown.
pub type MetricResult<T> = Result<T, StatsdError>;
