//! Connection lifecycle and the request/response cycle.

use crate::commands;
use crate::config::Configuration;
use crate::reader::LineReader;
use crate::redact::redact_command;
use crate::response::{DecodeError, DecodeStrategy, Response, ResponseDecoder};
use crate::transport::{Connector, TcpConnector, Transport};
use std::io::{self, ErrorKind, Write};
use thiserror::Error;

/// How many times a stale socket is reopened before `send` gives up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Errors raised by [`Connection`]. Commands the daemon rejects are not
/// errors; they come back as [`Response::Failure`].
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("error connecting to mpd://{address}: {source}")]
    Establish {
        address: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to send data to mpd://{address}: maximum retries ({retries}) reached")]
    RetriesExhausted { address: String, retries: u32 },
    #[error("connection is not established")]
    NotEstablished,
    #[error("{0}")]
    InvalidPassword(String),
    #[error("I/O error talking to the daemon: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

struct Session<S> {
    reader: LineReader<S>,
    protocol_version: Option<String>,
}

/// A single blocking connection to a daemon.
///
/// Starts closed. `send` takes `&mut self`, so there is never more than one
/// command in flight.
pub struct Connection<C: Connector = TcpConnector> {
    configuration: Configuration,
    connector: C,
    session: Option<Session<C::Stream>>,
}

impl Connection<TcpConnector> {
    pub fn new(configuration: Configuration) -> Self {
        Self::with_connector(configuration, TcpConnector)
    }
}

impl<C: Connector> Connection<C> {
    pub fn with_connector(configuration: Configuration, connector: C) -> Self {
        Self {
            configuration,
            connector,
            session: None,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    /// Swap the target. An open socket is closed first, since it belongs to
    /// the old configuration.
    pub fn attach_configuration(&mut self, configuration: Configuration) -> &mut Self {
        self.close();
        self.configuration = configuration;
        self
    }

    /// Connect, consume the greeting, and authenticate if a password is set.
    pub fn open(&mut self) -> Result<&mut Self, ConnectionError> {
        self.close();
        let address = self.configuration.to_string();

        let stream = self
            .connector
            .connect(&self.configuration)
            .map_err(|source| {
                tracing::warn!(%address, error = %source, "failed to connect");
                ConnectionError::Establish {
                    address: address.clone(),
                    source,
                }
            })?;

        let mut reader = LineReader::new(stream);
        let greeting = match reader.read_line() {
            Ok(Some(greeting)) => greeting,
            Ok(None) => {
                return Err(ConnectionError::Establish {
                    address,
                    source: io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "connection closed before greeting",
                    ),
                })
            }
            Err(source) => return Err(ConnectionError::Establish { address, source }),
        };

        let protocol_version = greeting.strip_prefix("OK MPD ").map(str::to_owned);
        if protocol_version.is_none() {
            tracing::warn!(%address, %greeting, "unexpected greeting");
        }
        tracing::debug!(%address, version = ?protocol_version, "connected");

        self.session = Some(Session {
            reader,
            protocol_version,
        });

        if let Err(err) = self.authorize() {
            self.close();
            return Err(err);
        }
        Ok(self)
    }

    /// Drop the socket. Safe to call when already closed.
    pub fn close(&mut self) -> &mut Self {
        if self.session.take().is_some() {
            tracing::debug!(address = %self.configuration, "connection closed");
        }
        self
    }

    /// Whether a socket is held. Does not probe the peer.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Version announced in the greeting of the current socket.
    pub fn protocol_version(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.protocol_version.as_deref())
    }

    /// Send a command and decode its reply, grouping records as
    /// [`commands::strategy_for`] prescribes.
    pub fn send(&mut self, command: &str, arguments: &[&str]) -> Result<Response, ConnectionError> {
        self.send_with(commands::strategy_for(command), command, arguments)
    }

    /// Like [`Connection::send`] with an explicit decoding strategy.
    ///
    /// A stale socket is reopened (and re-authenticated) up to
    /// [`MAX_RECONNECT_ATTEMPTS`] times before the command is written. Any
    /// failure after that point, the liveness check included, closes the
    /// connection.
    pub fn send_with(
        &mut self,
        strategy: DecodeStrategy,
        command: &str,
        arguments: &[&str],
    ) -> Result<Response, ConnectionError> {
        if !self.is_connected() {
            return Err(ConnectionError::NotEstablished);
        }

        let request = frame_command(command, arguments);
        let redacted = redact_command(&request);
        tracing::trace!(request = %redacted.trim_end(), "sending command");

        let result = self
            .check_connection()
            .and_then(|()| self.round_trip(&request, strategy));
        match &result {
            Ok(Response::Failure(failure)) => tracing::debug!(
                command,
                code = failure.error_code,
                message = %failure.message,
                "command rejected"
            ),
            Ok(Response::Success(_)) => {}
            Err(err) => {
                tracing::warn!(command, error = %err, "round trip failed, closing connection");
                self.close();
            }
        }
        result
    }

    fn round_trip(
        &mut self,
        request: &str,
        strategy: DecodeStrategy,
    ) -> Result<Response, ConnectionError> {
        let session = self
            .session
            .as_mut()
            .ok_or(ConnectionError::NotEstablished)?;

        let stream = session.reader.get_mut();
        stream.write_all(request.as_bytes())?;
        stream.flush()?;

        let lines = session.reader.read_all()?;
        Ok(ResponseDecoder::decode(lines.as_slice(), strategy)?)
    }

    fn authorize(&mut self) -> Result<(), ConnectionError> {
        let Some(password) = self.configuration.password().map(str::to_owned) else {
            return Ok(());
        };
        match self.send(commands::PASSWORD, &[password.as_str()])? {
            Response::Success(_) => Ok(()),
            Response::Failure(failure) => {
                tracing::warn!(address = %self.configuration, "password rejected");
                Err(ConnectionError::InvalidPassword(capitalize(&failure.message)))
            }
        }
    }

    /// Reopen while the peer has hung up. Reopening re-enters `send` through
    /// `authorize`; that terminates because a fresh socket is not at EOF.
    fn check_connection(&mut self) -> Result<(), ConnectionError> {
        let mut retries = MAX_RECONNECT_ATTEMPTS;
        while self.is_stale()? {
            if retries == 0 {
                return Err(ConnectionError::RetriesExhausted {
                    address: self.configuration.to_string(),
                    retries: MAX_RECONNECT_ATTEMPTS,
                });
            }
            retries -= 1;
            tracing::info!(
                address = %self.configuration,
                attempt = MAX_RECONNECT_ATTEMPTS - retries,
                "daemon closed the connection, reopening"
            );
            self.close();
            self.open()?;
        }
        Ok(())
    }

    fn is_stale(&mut self) -> Result<bool, ConnectionError> {
        let session = self
            .session
            .as_mut()
            .ok_or(ConnectionError::NotEstablished)?;
        Ok(session.reader.get_mut().is_at_eof()?)
    }
}

/// Build the request line: arguments double-quoted, embedded `"` escaped.
/// Nothing else is escaped.
pub fn frame_command(command: &str, arguments: &[&str]) -> String {
    let mut request = String::from(command);
    for argument in arguments {
        request.push_str(" \"");
        request.push_str(&argument.replace('"', "\\\""));
        request.push('"');
    }
    request.push('\n');
    request
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
