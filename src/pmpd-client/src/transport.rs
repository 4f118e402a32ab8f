//! Byte-stream seam between [`Connection`](crate::Connection) and the socket.

use crate::config::Configuration;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};

/// A bidirectional stream that can report whether the peer has hung up.
pub trait Transport: Read + Write {
    /// True when the peer closed its side of the stream.
    ///
    /// Must not consume any bytes the reader has yet to see.
    fn is_at_eof(&mut self) -> io::Result<bool>;
}

/// Opens transports for a configuration.
pub trait Connector {
    type Stream: Transport;

    fn connect(&mut self, config: &Configuration) -> io::Result<Self::Stream>;
}

impl Transport for TcpStream {
    fn is_at_eof(&mut self) -> io::Result<bool> {
        self.set_nonblocking(true)?;
        let mut probe = [0u8; 1];
        let result = match self.peek(&mut probe) {
            Ok(0) => Ok(true),
            Ok(_) => Ok(false),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(false),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe
                ) =>
            {
                Ok(true)
            }
            Err(err) => Err(err),
        };
        self.set_nonblocking(false)?;
        result
    }
}

/// Plain TCP, the only transport the daemon speaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn connect(&mut self, config: &Configuration) -> io::Result<TcpStream> {
        let stream = match config.timeout() {
            Some(timeout) => connect_with_timeout(config, timeout)?,
            None => TcpStream::connect((config.host(), config.port()))?,
        };
        stream.set_read_timeout(config.timeout())?;
        stream.set_write_timeout(config.timeout())?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

fn connect_with_timeout(
    config: &Configuration,
    timeout: std::time::Duration,
) -> io::Result<TcpStream> {
    let mut last_error = None;
    for addr in (config.host(), config.port()).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                tracing::debug!(%addr, error = %err, "connect attempt failed");
                last_error = Some(err);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| {
        io::Error::new(
            ErrorKind::AddrNotAvailable,
            format!("{config} did not resolve to any address"),
        )
    }))
}
