//! A liveness guard for stream transports.
//!
//! An outbound-only protocol never reads from its socket, so a peer that went
//! away is only noticed once the kernel gives up retransmitting, which can take
//! many minutes while every write keeps "succeeding" into the send buffer.
//! [`SafeConn`] reads one byte under a short deadline before each write: end of
//! stream means the peer closed, and the write fails immediately instead.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::trace;

use super::writer::{connect_tcp, resolve, Writer};
use crate::{MetricResult, StatsdError};

/// Deadline for the probe read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(10);
/// Deadline for establishing the connection.
pub const DEFAULT_CONN_TIMEOUT: Duration = super::writer::DEFAULT_CONNECT_TIMEOUT;

/// A byte stream the guard can probe.
pub trait DuplexStream: Read + Write + Send {
    /// Sets the deadline applied to subsequent reads.
    ///
    /// # Errors
    /// Returns an error if the deadline cannot be applied.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()>;

    /// Closes both directions of the stream.
    ///
    /// # Errors
    /// Returns an error if the stream fails to shut down.
    fn close(&mut self) -> io::Result<()>;
}

impl DuplexStream for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_read_timeout(self, timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

#[cfg(unix)]
impl DuplexStream for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_read_timeout(self, timeout)
    }

    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// Stream writer that refuses to write to a peer that has already hung up.
///
/// Failures found by the probe are reported as [`StatsdError::ConnectionClosed`],
/// distinct from [`StatsdError::StdIo`] raised by the write itself.
#[derive(Debug)]
pub struct SafeConn<S> {
    stream: S,
    read_timeout: Duration,
}

impl SafeConn<TcpStream> {
    /// Dials `address` over TCP.
    ///
    /// # Errors
    /// Fails if the address does not resolve, no resolved address accepts the
    /// connection within `conn_timeout`, or `read_timeout` is zero.
    pub fn connect(address: &str, conn_timeout: Duration, read_timeout: Duration) -> MetricResult<Self> {
        let addrs = resolve(address)?;
        let stream = connect_tcp(&addrs, conn_timeout)?;
        Self::new(stream, read_timeout)
    }

    /// Dials `address` with [`DEFAULT_CONN_TIMEOUT`] and [`DEFAULT_READ_TIMEOUT`].
    ///
    /// # Errors
    /// See [`SafeConn::connect`].
    pub fn connect_with_default_timeouts(address: &str) -> MetricResult<Self> {
        Self::connect(address, DEFAULT_CONN_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }
}

impl<S: DuplexStream> SafeConn<S> {
    /// Wraps an already connected stream.
    ///
    /// # Errors
    /// Returns [`StatsdError::InvalidReadTimeout`] for a zero `read_timeout`,
    /// which sockets reject as a deadline.
    pub fn new(stream: S, read_timeout: Duration) -> MetricResult<Self> {
        if read_timeout.is_zero() {
            return Err(StatsdError::InvalidReadTimeout);
        }
        Ok(Self {
            stream,
            read_timeout,
        })
    }

    /// Deadline used by the probe read.
    pub const fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Borrows the wrapped stream.
    pub const fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwraps the stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Probes the peer with a one byte read bounded by the read timeout.
    ///
    /// Only end of stream, or failing to set the deadline, counts as closed.
    /// A timeout means the peer is idle. A byte that arrives is discarded, the
    /// protocol never expects inbound data.
    pub fn is_closed(&mut self) -> bool {
        if let Err(err) = self.stream.set_read_timeout(Some(self.read_timeout)) {
            trace!(error = %err, "failed to set probe deadline");
            return true;
        }

        let mut one = [0u8; 1];
        match self.stream.read(&mut one) {
            Ok(0) => true,
            Ok(_) => false,
            Err(err) => {
                if !matches!(err.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) {
                    trace!(error = %err, "probe read failed, deferring to write");
                }
                false
            }
        }
    }
}

impl<S: DuplexStream> Writer for SafeConn<S> {
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        if self.is_closed() {
            return Err(StatsdError::ConnectionClosed);
        }
        self.stream.write_all(buf)?;
        Ok(buf.len())
    }

    fn close(&mut self) -> MetricResult<()> {
        Ok(self.stream.close()?)
    }
}
