use std::io::Write as _;
use std::net::{
    Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket,
};
use std::time::Duration;

use tracing::debug;

use super::options::Network;
use crate::{MetricResult, StatsdError};

/// Timeout used when dialing a stream transport.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The transport a [`Conn`](super::conn::Conn) flushes into.
///
/// Each call to [`Writer::write`] carries one complete packet: datagram transports
/// must send it as a single datagram, stream transports must write all of it.
/// The writer is owned by the connection and closed exactly once on teardown.
pub trait Writer: Send {
    /// Writes one packet, returning the number of bytes accepted.
    ///
    /// # Errors
    /// Returns `MetricResult::Err` if the transport rejects the write.
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize>;

    /// Closes the transport.
    ///
    /// # Errors
    /// Returns `MetricResult::Err` if the transport fails to close cleanly.
    fn close(&mut self) -> MetricResult<()>;
}

impl<T> Writer for Box<T>
where
    T: Writer + ?Sized,
{
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        (**self).write(buf)
    }

    fn close(&mut self) -> MetricResult<()> {
        (**self).close()
    }
}

/// Connected UDP socket; every write is one datagram.
impl Writer for UdpSocket {
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        Ok(self.send(buf)?)
    }

    fn close(&mut self) -> MetricResult<()> {
        // the socket is released when the connection drops the writer
        Ok(())
    }
}

impl Writer for TcpStream {
    fn write(&mut self, buf: &[u8]) -> MetricResult<usize> {
        self.write_all(buf)?;
        Ok(buf.len())
    }

    fn close(&mut self) -> MetricResult<()> {
        Ok(self.shutdown(Shutdown::Both)?)
    }
}

pub(crate) struct Dialed {
    pub writer: Box<dyn Writer>,
    pub trim_trailing_newline: bool,
}

/// Opens the transport for `network` and `address`.
///
/// UDP keeps the historical behavior of stripping the final newline of each
/// packet. With `udp_check`, two empty datagrams are sent so that an ICMP
/// "port unreachable" from a missing daemon surfaces here instead of on the
/// first flush.
pub(crate) fn dial(network: Network, address: &str, udp_check: bool) -> MetricResult<Dialed> {
    let addrs = resolve(address)?;
    match network {
        Network::Udp => {
            let sock = connect_udp(&addrs)?;
            if udp_check {
                for _ in 0..2 {
                    sock.send(&[])?;
                }
            }
            Ok(Dialed {
                writer: Box::new(sock),
                trim_trailing_newline: true,
            })
        }
        Network::Tcp => Ok(Dialed {
            writer: Box::new(connect_tcp(&addrs, DEFAULT_CONNECT_TIMEOUT)?),
            trim_trailing_newline: false,
        }),
    }
}

pub(crate) fn resolve(address: &str) -> MetricResult<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = address.to_socket_addrs()?.collect();
    if addrs.is_empty() {
        return Err(StatsdError::AddressResolution(address.to_string()));
    }
    Ok(addrs)
}

fn connect_udp(addrs: &[SocketAddr]) -> MetricResult<UdpSocket> {
    let mut last_err = None;
    for addr in addrs {
        let bind_addr: SocketAddr = match addr {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        match UdpSocket::bind(bind_addr).and_then(|sock| {
            sock.connect(addr)?;
            Ok(sock)
        }) {
            Ok(sock) => return Ok(sock),
            Err(err) => {
                debug!(%addr, error = %err, "UDP connect failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.map_or_else(|| StatsdError::AddressResolution(format!("{addrs:?}")), Into::into))
}

pub(crate) fn connect_tcp(addrs: &[SocketAddr], timeout: Duration) -> MetricResult<TcpStream> {
    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!(%addr, error = %err, "TCP connect failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.map_or_else(|| StatsdError::AddressResolution(format!("{addrs:?}")), Into::into))
}
