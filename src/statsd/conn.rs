use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, tick, Receiver, Sender};
use crossbeam::select;
use hashbrown::HashMap;
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use super::options::{ErrorHandler, DEFAULT_FLUSH_PERIOD, DEFAULT_MAX_PACKET_SIZE};
use super::tags::TagFormat;
use super::writer::Writer;
use super::{MetricType, Number};
use crate::{MetricResult, StatsdError};

// Room for one metric past `max_packet_size` before the buffer must grow.
const BUFFER_SLACK: usize = 200;
// Larger limits start from this capacity and grow on demand.
const MAX_PREALLOCATED: usize = DEFAULT_MAX_PACKET_SIZE * 64;

/// Settings of a [`Conn`].
#[derive(Clone)]
pub struct ConnConfig {
    /// Flush threshold in bytes.
    pub max_packet_size: usize,
    /// Period of the background flush. Zero disables it.
    pub flush_period: Duration,
    /// Flush the whole buffer after every metric.
    pub inline_flush: bool,
    /// Where tag strings are spliced.
    pub tag_format: TagFormat,
    /// Receives flush errors.
    pub error_handler: Option<ErrorHandler>,
    /// Drop the final `\n` of each packet.
    pub trim_trailing_newline: bool,
}

impl Default for ConnConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            flush_period: DEFAULT_FLUSH_PERIOD,
            inline_flush: false,
            tag_format: TagFormat::None,
            error_handler: None,
            trim_trailing_newline: false,
        }
    }
}

impl std::fmt::Debug for ConnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnConfig")
            .field("max_packet_size", &self.max_packet_size)
            .field("flush_period", &self.flush_period)
            .field("inline_flush", &self.inline_flush)
            .field("tag_format", &self.tag_format)
            .field("error_handler", &self.error_handler.as_ref().map(|_| "Fn(..)"))
            .field("trim_trailing_newline", &self.trim_trailing_newline)
            .finish()
    }
}

/// Buffered line encoder over a [`Writer`].
///
/// Every operation appends complete lines to one shared buffer under a single
/// lock, then flushes when the buffer grows past `max_packet_size`. A size
/// triggered flush stops at the end of the last line written before the current
/// call, so no packet ever carries half a metric; one packet may therefore run
/// over the limit by up to one metric.
///
/// Nothing here returns an error to the caller: write failures go to the
/// configured error handler and the flushed bytes are dropped either way.
///
/// Dropping the connection closes it.
pub struct Conn {
    state: Arc<Mutex<ConnState>>,
    shutdown: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

struct ConnState {
    closed: bool,
    writer: Option<Box<dyn Writer>>,
    buf: Vec<u8>,
    // lazily created on the first rate other than 1, keyed by f32 bits
    rate_cache: Option<HashMap<u32, String>>,
    int_writer: itoa::Buffer,

    max_packet_size: usize,
    tag_format: TagFormat,
    inline_flush: bool,
    trim_trailing_newline: bool,
    error_handler: Option<ErrorHandler>,
}

impl Conn {
    /// Creates a connection flushing into `writer`.
    ///
    /// Starts the background flush thread when `flush_period` is non-zero and
    /// `inline_flush` is off.
    ///
    /// # Errors
    /// Returns `MetricResult::Err` if the flush thread cannot be spawned.
    pub fn new(config: ConnConfig, writer: Box<dyn Writer>) -> MetricResult<Self> {
        let period = config.flush_period;
        let periodic = !period.is_zero() && !config.inline_flush;
        let state = Arc::new(Mutex::new(ConnState::new(config, Some(writer))));

        if !periodic {
            return Ok(Self::from_state(state, None, None));
        }

        let (sender, receiver) = bounded::<()>(0);
        let worker = spawn_flush_worker(state.clone(), period, receiver)?;
        Ok(Self::from_state(state, Some(sender), Some(worker)))
    }

    /// A connection without transport, used by muted clients.
    pub(crate) fn disconnected(config: ConnConfig) -> Self {
        Self::from_state(Arc::new(Mutex::new(ConnState::new(config, None))), None, None)
    }

    fn from_state(
        state: Arc<Mutex<ConnState>>,
        shutdown: Option<Sender<()>>,
        worker: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            state,
            shutdown: Mutex::new(shutdown),
            worker: Mutex::new(worker),
        }
    }

    /// Tag placement this connection was built with.
    pub fn tag_format(&self) -> TagFormat {
        self.state.lock().tag_format
    }

    /// Whether [`Conn::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Appends `<prefix><bucket>:<n>|c[|@rate]`.
    pub fn count(&self, prefix: &str, bucket: &str, n: impl Into<Number>, rate: f32, tags: &str) {
        self.metric(prefix, bucket, n.into(), MetricType::Count, rate, tags);
    }

    /// Appends `<prefix><bucket>:<ms>|ms[|@rate]`.
    pub fn timing(&self, prefix: &str, bucket: &str, ms: impl Into<Number>, rate: f32, tags: &str) {
        self.metric(prefix, bucket, ms.into(), MetricType::Timing, rate, tags);
    }

    /// Appends `<prefix><bucket>:<value>|h[|@rate]`.
    pub fn histogram(
        &self,
        prefix: &str,
        bucket: &str,
        value: impl Into<Number>,
        rate: f32,
        tags: &str,
    ) {
        self.metric(prefix, bucket, value.into(), MetricType::Histogram, rate, tags);
    }

    fn metric(&self, prefix: &str, bucket: &str, n: Number, typ: MetricType, rate: f32, tags: &str) {
        let mut state = self.state.lock();
        if state.reject_closed(bucket) {
            return;
        }
        let last_safe_len = state.buf.len();
        state.append_bucket(prefix, bucket, tags);
        state.append_number(n);
        state.append_type(typ);
        state.append_rate(rate);
        state.close_metric(tags);
        state.flush_if_necessary(last_safe_len);
    }

    /// Sets a gauge to an absolute value.
    ///
    /// A leading sign makes the daemon treat a gauge as a delta, so a negative
    /// value is written as a reset to `0` followed by the value. Tags go on both
    /// lines so the reset hits the same series. Zero of either sign is written
    /// once, as `0`.
    pub fn gauge(&self, prefix: &str, bucket: &str, value: impl Into<Number>, tags: &str) {
        let mut value = value.into();
        let mut state = self.state.lock();
        if state.reject_closed(bucket) {
            return;
        }
        let last_safe_len = state.buf.len();

        if value.as_float() == Some(0.0) {
            value = Number::U8(0);
        } else if value.is_negative() {
            state.append_bucket(prefix, bucket, tags);
            state.append_gauge(Number::U8(0), tags);
        }
        state.append_bucket(prefix, bucket, tags);
        state.append_gauge(value, tags);
        state.flush_if_necessary(last_safe_len);
    }

    /// Changes a gauge by `value`, written with an explicit sign.
    pub fn gauge_relative(&self, prefix: &str, bucket: &str, value: impl Into<Number>, tags: &str) {
        let value = value.into();
        let mut state = self.state.lock();
        if state.reject_closed(bucket) {
            return;
        }
        let last_safe_len = state.buf.len();
        state.append_bucket(prefix, bucket, tags);
        if needs_plus_sign(value) {
            state.buf.push(b'+');
        }
        state.append_gauge(value, tags);
        state.flush_if_necessary(last_safe_len);
    }

    /// Appends `<prefix><bucket>:<value>|s`. Sets are never sampled.
    pub fn unique(&self, prefix: &str, bucket: &str, value: &str, tags: &str) {
        let mut state = self.state.lock();
        if state.reject_closed(bucket) {
            return;
        }
        let last_safe_len = state.buf.len();
        state.append_bucket(prefix, bucket, tags);
        state.buf.extend_from_slice(value.as_bytes());
        state.append_type(MetricType::Set);
        state.close_metric(tags);
        state.flush_if_necessary(last_safe_len);
    }

    /// Flushes the whole buffer now.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        if !state.closed {
            state.flush(0);
        }
    }

    /// Flushes what is left and closes the writer.
    ///
    /// The closed flag is set and the final flush done before the writer is
    /// closed, so the background flush can never fire afterwards. Later calls,
    /// and any metric recorded after this, are no-ops.
    ///
    /// # Errors
    /// Returns the writer's close error. Errors from the final flush go to the
    /// error handler like any other flush.
    pub fn close(&self) -> MetricResult<()> {
        let result = {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.flush(0);
            state.writer.take().map_or(Ok(()), |mut writer| writer.close())
        };

        // wake the flush worker so it observes `closed` and exits
        drop(self.shutdown.lock().take());
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                warn!("statsd flush worker panicked");
            }
        }
        result
    }
}

impl Drop for Conn {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!("Error closing statsd connection: {err}");
        }
    }
}

fn spawn_flush_worker(
    state: Arc<Mutex<ConnState>>,
    period: Duration,
    shutdown: Receiver<()>,
) -> MetricResult<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("statsd-flush".to_string())
        .spawn(move || {
            let ticker = tick(period);
            loop {
                select! {
                    recv(ticker) -> _ => (),
                    // only ever disconnected, never sent to
                    recv(shutdown) -> _ => return,
                }

                let mut state = state.lock();
                if state.closed {
                    return;
                }
                state.flush(0);
            }
        })?;
    Ok(handle)
}

// NaN, +0 and finite positive floats get a `+`; `+Inf` already prints one and
// `-0` keeps its own sign.
fn needs_plus_sign(value: Number) -> bool {
    value.as_float().map_or_else(
        || !value.is_negative(),
        |f| f.is_nan() || (f == 0.0 && f.is_sign_positive()) || (f > 0.0 && f <= f64::MAX),
    )
}

impl ConnState {
    fn new(config: ConnConfig, writer: Option<Box<dyn Writer>>) -> Self {
        Self {
            closed: false,
            writer,
            buf: Vec::with_capacity(
                config
                    .max_packet_size
                    .saturating_add(BUFFER_SLACK)
                    .min(MAX_PREALLOCATED),
            ),
            rate_cache: None,
            int_writer: itoa::Buffer::new(),
            max_packet_size: config.max_packet_size,
            tag_format: config.tag_format,
            inline_flush: config.inline_flush,
            trim_trailing_newline: config.trim_trailing_newline,
            error_handler: config.error_handler,
        }
    }

    fn reject_closed(&self, bucket: &str) -> bool {
        if self.closed {
            debug!(bucket, "metric recorded after close, dropping");
        }
        self.closed
    }

    fn append_bucket(&mut self, prefix: &str, bucket: &str, tags: &str) {
        self.buf.extend_from_slice(prefix.as_bytes());
        self.buf.extend_from_slice(bucket.as_bytes());
        if self.tag_format == TagFormat::InfluxDB {
            self.buf.extend_from_slice(tags.as_bytes());
        }
        self.buf.push(b':');
    }

    fn append_number(&mut self, n: Number) {
        n.append_to(&mut self.buf, &mut self.int_writer);
    }

    fn append_type(&mut self, typ: MetricType) {
        self.buf.push(b'|');
        self.buf.extend_from_slice(typ.as_str().as_bytes());
    }

    #[allow(clippy::float_cmp)]
    fn append_rate(&mut self, rate: f32) {
        if rate == 1.0 {
            return;
        }

        let formatted = self
            .rate_cache
            .get_or_insert_with(HashMap::new)
            .entry(rate.to_bits())
            .or_insert_with(|| rate.to_string());
        self.buf.extend_from_slice(b"|@");
        self.buf.extend_from_slice(formatted.as_bytes());
    }

    fn append_gauge(&mut self, value: Number, tags: &str) {
        self.append_number(value);
        self.append_type(MetricType::Gauge);
        self.close_metric(tags);
    }

    fn close_metric(&mut self, tags: &str) {
        if self.tag_format == TagFormat::Datadog {
            self.buf.extend_from_slice(tags.as_bytes());
        }
        self.buf.push(b'\n');
    }

    fn flush_if_necessary(&mut self, last_safe_len: usize) {
        if self.inline_flush {
            self.flush(0);
        } else if self.buf.len() > self.max_packet_size {
            self.flush(last_safe_len);
        }
    }

    /// Writes the first `n` bytes of the buffer as one packet, `0` meaning all of it.
    fn flush(&mut self, n: usize) {
        if self.buf.is_empty() {
            return;
        }
        let n = if n == 0 { self.buf.len() } else { n };

        let mut packet = &self.buf[..n];
        if self.trim_trailing_newline {
            if let Some(trimmed) = packet.strip_suffix(b"\n") {
                packet = trimmed;
            }
        }

        let result = match self.writer.as_mut() {
            Some(writer) => writer.write(packet),
            None => Ok(0),
        };
        match result {
            Ok(written) => trace!(written, pending = self.buf.len() - n, "flushed packet"),
            Err(err) => self.handle_error(&err),
        }

        // dropped whether or not the write succeeded
        self.buf.drain(..n);
    }

    fn handle_error(&self, err: &StatsdError) {
        match &self.error_handler {
            Some(handler) => handler(err),
            None => debug!("dropping statsd packet: {err}"),
        }
    }
}
