//! Blocking client for the MPD line protocol.
//!
//! This crate provides:
//! - A [`LineReader`] that frames one reply off the socket without a length prefix
//! - A [`ResponseDecoder`] that turns the raw lines into [`Response`] values
//! - A [`Connection`] that owns the socket, reconnects stale sockets and authenticates
//!
//! # Protocol
//!
//! Requests are single lines, arguments double-quoted:
//!
//! ```text
//! add "some/file.flac"
//! ```
//!
//! Replies are zero or more `key: value` lines followed by `OK`, or by an
//! `ACK [code@line] {command} message` line when the daemon rejects the command.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pmpd_client::{commands, Configuration, Connection};
//!
//! let mut connection = Connection::new(Configuration::new("localhost", 6600));
//! connection.open()?;
//! let status = connection.send(commands::STATUS, &[])?;
//! if let Some(success) = status.success() {
//!     println!("state: {:?}", success.get_str("state"));
//! }
//! ```

pub mod commands;
mod config;
mod connection;
mod reader;
pub mod redact;
mod response;
mod transport;

pub use config::{Configuration, DEFAULT_HOST, DEFAULT_PORT};
pub use connection::{frame_command, Connection, ConnectionError, MAX_RECONNECT_ATTEMPTS};
pub use reader::{LineReader, CHUNK_SIZE};
pub use response::{
    AckCode, DecodeError, DecodeStrategy, FailureResponse, Fields, Payload, Response,
    ResponseDecoder, SuccessResponse, Value,
};
pub use transport::{Connector, TcpConnector, Transport};
