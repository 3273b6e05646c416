use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::tags::{merge_tags, Tag, TagFormat};
use super::writer::Writer;
use crate::{MetricResult, StatsdError};

/// Callback receiving transport errors raised while flushing.
///
/// Runs while the connection lock is held, so it must not call back into the
/// client that reported the error.
pub type ErrorHandler = Arc<dyn Fn(&StatsdError) + Send + Sync>;

/// Default daemon address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:8125";
/// Default maximum packet size, small enough to avoid IP fragmentation.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1440;
/// Default period of the background flush.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_millis(100);

/// Transport used when the client dials the daemon itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Network {
    /// Connected UDP socket.
    #[default]
    Udp,
    /// Plain TCP stream.
    Tcp,
}

impl FromStr for Network {
    type Err = StatsdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "udp" | "udp4" | "udp6" => Ok(Self::Udp),
            "tcp" | "tcp4" | "tcp6" => Ok(Self::Tcp),
            _ => Err(format!("unsupported network '{s}' (expected udp or tcp)").into()),
        }
    }
}

/// Configuration for [`Client::new`](super::client::Client::new).
///
/// # Example
///
/// ```no_run
/// use linestat::{Client, ClientOptions, TagFormat};
/// use std::time::Duration;
///
/// let options = ClientOptions {
///     address: "127.0.0.1:8125".to_string(),
///     flush_period: Duration::from_millis(200),
///     tag_format: TagFormat::Datadog,
///     ..Default::default()
/// }
/// .with_prefix("myapp")
/// .with_tag_pairs(&["env", "prod"])?;
///
/// let client = Client::new(options)?;
/// client.increment("requests");
/// # Ok::<(), linestat::StatsdError>(())
/// ```
pub struct ClientOptions {
    /// Address of the daemon. Ignored when `writer` is set.
    pub address: String,
    /// Transport to dial. Ignored when `writer` is set.
    pub network: Network,
    /// Called with every flush error. Errors are dropped when unset.
    ///
    /// Runs while the encoder lock is held, so it must not record metrics on
    /// the same client.
    pub error_handler: Option<ErrorHandler>,
    /// How often the buffer is flushed in the background. Zero disables the
    /// background flush, leaving only size-triggered and explicit flushes.
    pub flush_period: Duration,
    /// Packets are flushed once the buffer grows past this many bytes.
    pub max_packet_size: usize,
    /// Tag placement convention. Tags are ignored with `TagFormat::None`.
    pub tag_format: TagFormat,
    /// Tags sent with every metric.
    pub tags: Vec<Tag>,
    /// Transport to use instead of dialing. Closed when the client closes, or
    /// immediately when the client is muted.
    pub writer: Option<Box<dyn Writer>>,
    /// Flush after every metric. Takes precedence over `flush_period`.
    /// Does not guarantee one line per write.
    pub inline_flush: bool,
    /// Probe a dialed UDP destination during construction.
    pub udp_check: bool,
    /// A muted client does nothing.
    pub muted: bool,
    /// Fraction of count, timing and histogram calls that are sent.
    pub sample_rate: f32,
    /// Prepended to every bucket name.
    pub prefix: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            network: Network::Udp,
            error_handler: None,
            flush_period: DEFAULT_FLUSH_PERIOD,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            tag_format: TagFormat::None,
            tags: Vec::new(),
            writer: None,
            inline_flush: false,
            udp_check: true,
            muted: false,
            sample_rate: 1.0,
            prefix: String::new(),
        }
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientOptions")
            .field("address", &self.address)
            .field("network", &self.network)
            .field("error_handler", &self.error_handler.as_ref().map(|_| "Fn(..)"))
            .field("flush_period", &self.flush_period)
            .field("max_packet_size", &self.max_packet_size)
            .field("tag_format", &self.tag_format)
            .field("tags", &self.tags)
            .field("writer", &self.writer.as_ref().map(|_| "Writer(..)"))
            .field("inline_flush", &self.inline_flush)
            .field("udp_check", &self.udp_check)
            .field("muted", &self.muted)
            .field("sample_rate", &self.sample_rate)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl ClientOptions {
    /// Appends `prefix` to the bucket prefix, separated by exactly one dot.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        append_prefix(&mut self.prefix, prefix);
        self
    }

    /// Merges flat `key, value, key, value...` pairs into the tags. An existing
    /// key is replaced.
    ///
    /// # Errors
    /// Returns [`StatsdError::OddTagCount`] if `pairs` has an odd length.
    pub fn with_tag_pairs(mut self, pairs: &[&str]) -> MetricResult<Self> {
        merge_tags(&mut self.tags, tag_pairs(pairs)?);
        Ok(self)
    }

    pub(crate) fn validate(&self) -> MetricResult<()> {
        validate_rate(self.sample_rate)
    }
}

/// Overrides applied by [`Client::clone_with`](super::client::Client::clone_with).
///
/// Connection settings are shared with the parent and cannot be changed here.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    /// Appended to the parent's prefix.
    pub prefix: Option<String>,
    /// Replaces the parent's sample rate.
    pub sample_rate: Option<f32>,
    /// Merged over the parent's tags.
    pub tags: Vec<Tag>,
    /// Mutes the clone. Clones of a muted client are always muted.
    pub muted: Option<bool>,
}

/// Converts a flat `key, value, ...` list into tags.
///
/// # Errors
/// Returns [`StatsdError::OddTagCount`] if `pairs` has an odd length.
pub fn tag_pairs(pairs: &[&str]) -> MetricResult<Vec<Tag>> {
    if pairs.len() % 2 != 0 {
        return Err(StatsdError::OddTagCount(pairs.len()));
    }
    Ok(pairs
        .chunks_exact(2)
        .map(|pair| Tag::new(pair[0], pair[1]))
        .collect())
}

pub(crate) fn append_prefix(current: &mut String, prefix: &str) {
    current.push_str(prefix.trim_end_matches('.'));
    current.push('.');
}

pub(crate) fn validate_rate(rate: f32) -> MetricResult<()> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(StatsdError::InvalidSampleRate(rate))
    }
}
