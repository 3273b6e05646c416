use thiserror::Error;

/// Errors that can occur while building a client or transmitting metrics.
#[derive(Error, Debug)]
pub enum StatsdError {
    /// A custom error with a free-form message.
    #[error("Custom error: {0}")]
    Custom(String),

    /// An I/O error from the underlying transport.
    #[error("Std Io error: {0}")]
    StdIo(#[from] std::io::Error),

    /// The connection guard found the peer gone before writing.
    #[error("connection is closed")]
    ConnectionClosed,

    /// Tags were given as a flat key/value list with an odd length.
    #[error("tags must be key/value pairs, got {0} values")]
    OddTagCount(usize),

    /// Sample rate outside of `[0, 1]`.
    #[error("sample rate must be within [0, 1], got {0}")]
    InvalidSampleRate(f32),

    /// The guard's probe read needs a non-zero deadline.
    #[error("read timeout must be greater than zero")]
    InvalidReadTimeout,

    /// An address resolved to nothing usable.
    #[error("could not resolve address: {0}")]
    AddressResolution(String),
}

impl StatsdError {
    /// Returns `true` when the error was raised by the liveness probe rather than a failed write.
    #[must_use]
    pub const fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

impl From<String> for StatsdError {
    fn from(value: String) -> Self {
        Self::Custom(value)
    }
}

impl From<&str> for StatsdError {
    fn from(value: &str) -> Self {
        Self::Custom(value.to_string())
    }
}
