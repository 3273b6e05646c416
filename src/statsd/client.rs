use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use super::conn::{Conn, ConnConfig};
use super::options::{append_prefix, validate_rate, ClientOptions, CloneOptions};
use super::tags::{merge_tags, Tag, TagFormat};
use super::writer::dial;
use super::Number;
use crate::MetricResult;

/// StatsD client.
///
/// All clones share one buffered connection, so metrics from every clone are
/// batched together and [`Client::close`] on any of them closes it for all.
/// The connection is closed when the last clone is dropped.
///
/// # Example
///
/// ```no_run
/// use linestat::{Client, ClientOptions, CloneOptions};
///
/// let client = Client::new(ClientOptions::default().with_prefix("app"))?;
/// client.increment("requests");
/// client.gauge("queue.depth", -3);
///
/// let db = client.clone_with(CloneOptions {
///     prefix: Some("db".to_string()),
///     sample_rate: Some(0.1),
///     ..Default::default()
/// })?;
/// let timing = db.new_timing();
/// // ... run the query
/// timing.send("query");
///
/// client.close()?;
/// # Ok::<(), linestat::StatsdError>(())
/// ```
#[derive(Clone)]
pub struct Client {
    conn: Arc<Conn>,
    muted: bool,
    rate: f32,
    prefix: String,
    tags: Vec<Tag>,
    // `tags` joined for the connection's tag format
    joined_tags: String,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("muted", &self.muted)
            .field("rate", &self.rate)
            .field("prefix", &self.prefix)
            .field("tags", &self.joined_tags)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Builds a client, dialing the daemon unless a writer is supplied.
    ///
    /// A muted client never dials and closes a supplied writer right away.
    ///
    /// # Errors
    /// Fails on an invalid sample rate, when dialing fails (including the UDP
    /// check), or when the flush thread cannot be started.
    pub fn new(mut options: ClientOptions) -> MetricResult<Self> {
        options.validate()?;

        let config = ConnConfig {
            max_packet_size: options.max_packet_size,
            flush_period: options.flush_period,
            inline_flush: options.inline_flush,
            tag_format: options.tag_format,
            error_handler: options.error_handler.take(),
            trim_trailing_newline: false,
        };

        let conn = if options.muted {
            if let Some(mut writer) = options.writer.take() {
                if let Err(err) = writer.close() {
                    debug!("Error closing writer of muted client: {err}");
                }
            }
            Conn::disconnected(config)
        } else if let Some(writer) = options.writer.take() {
            Conn::new(config, writer)?
        } else {
            let dialed = dial(options.network, &options.address, options.udp_check)?;
            Conn::new(
                ConnConfig {
                    trim_trailing_newline: dialed.trim_trailing_newline,
                    ..config
                },
                dialed.writer,
            )?
        };

        let joined_tags = options.tag_format.join(&options.tags);
        Ok(Self {
            conn: Arc::new(conn),
            muted: options.muted,
            rate: options.sample_rate,
            prefix: options.prefix,
            tags: options.tags,
            joined_tags,
        })
    }

    /// Derives a client sharing this client's connection.
    ///
    /// # Errors
    /// Returns [`StatsdError::InvalidSampleRate`](crate::StatsdError::InvalidSampleRate)
    /// for a rate outside `[0, 1]`.
    pub fn clone_with(&self, options: CloneOptions) -> MetricResult<Self> {
        let mut clone = self.clone();
        if let Some(prefix) = options.prefix {
            append_prefix(&mut clone.prefix, &prefix);
        }
        if let Some(rate) = options.sample_rate {
            validate_rate(rate)?;
            clone.rate = rate;
        }
        if !options.tags.is_empty() {
            merge_tags(&mut clone.tags, options.tags);
            clone.joined_tags = self.tag_format().join(&clone.tags);
        }
        clone.muted = self.muted || options.muted.unwrap_or(false);
        Ok(clone)
    }

    /// Tag convention of the shared connection.
    pub fn tag_format(&self) -> TagFormat {
        self.conn.tag_format()
    }

    /// Bucket prefix, including its trailing dot.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether this client drops everything.
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    /// Adds `n` to a counter.
    pub fn count(&self, bucket: &str, n: impl Into<Number>) {
        if self.skip() {
            return;
        }
        self.conn
            .count(&self.prefix, bucket, n, self.rate, &self.joined_tags);
    }

    /// Adds one to a counter.
    pub fn increment(&self, bucket: &str) {
        self.count(bucket, 1u8);
    }

    /// Sets a gauge. Gauges are never sampled.
    pub fn gauge(&self, bucket: &str, value: impl Into<Number>) {
        if self.muted {
            return;
        }
        self.conn
            .gauge(&self.prefix, bucket, value, &self.joined_tags);
    }

    /// Moves a gauge by `delta`.
    pub fn gauge_relative(&self, bucket: &str, delta: impl Into<Number>) {
        if self.muted {
            return;
        }
        self.conn
            .gauge_relative(&self.prefix, bucket, delta, &self.joined_tags);
    }

    /// Records a duration in milliseconds.
    pub fn timing(&self, bucket: &str, ms: impl Into<Number>) {
        if self.skip() {
            return;
        }
        self.conn
            .timing(&self.prefix, bucket, ms, self.rate, &self.joined_tags);
    }

    /// Records a histogram value.
    pub fn histogram(&self, bucket: &str, value: impl Into<Number>) {
        if self.skip() {
            return;
        }
        self.conn
            .histogram(&self.prefix, bucket, value, self.rate, &self.joined_tags);
    }

    /// Counts a distinct value in a set.
    pub fn unique(&self, bucket: &str, value: &str) {
        if self.muted {
            return;
        }
        self.conn
            .unique(&self.prefix, bucket, value, &self.joined_tags);
    }

    /// Starts a timer to send later with [`Timing::send`].
    #[must_use]
    pub fn new_timing(&self) -> Timing<'_> {
        Timing {
            client: self,
            start: Instant::now(),
        }
    }

    /// Sends everything buffered now.
    pub fn flush(&self) {
        if !self.muted {
            self.conn.flush();
        }
    }

    /// Flushes and closes the shared connection.
    ///
    /// # Errors
    /// Returns the transport's close error.
    pub fn close(&self) -> MetricResult<()> {
        self.conn.close()
    }

    // Sampling is decided here; the connection encodes whatever it is given.
    #[allow(clippy::float_cmp)]
    fn skip(&self) -> bool {
        self.muted || (self.rate != 1.0 && rand::random::<f32>() > self.rate)
    }
}

/// A running timer created by [`Client::new_timing`].
#[derive(Debug)]
pub struct Timing<'a> {
    client: &'a Client,
    start: Instant,
}

impl Timing<'_> {
    /// Sends the elapsed whole milliseconds as a timing.
    pub fn send(&self, bucket: &str) {
        let ms = u64::try_from(self.duration().as_millis()).unwrap_or(u64::MAX);
        self.client.timing(bucket, ms);
    }

    /// Time elapsed since the timer started.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.start.elapsed()
    }
}
