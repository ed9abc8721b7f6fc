//! Error types for shardwire

use std::io;
use thiserror::Error;

use super::resp::RespValue;

/// Top-level library error
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Cluster error: {0}")]
    Cluster(#[from] ClusterError),
}

/// Connection-related errors
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("dial failed: address({address}), tls({tls}): {source}")]
    DialFailed {
        address: String,
        tls: bool,
        source: io::Error,
    },

    #[error("auth failed: address({address}): {reason}")]
    AuthFailed { address: String, reason: String },

    #[error("ping failed: address({address}): {reason}")]
    PingFailed { address: String, reason: String },

    #[error("TLS setup failed: {0}")]
    TlsFailed(String),

    #[error("no address configured")]
    NoAddress,

    #[error("connection closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl ConnectionError {
    /// True when the error came from a deadline expiring on a socket read or write
    pub fn is_timeout(&self) -> bool {
        let io_err = match self {
            ConnectionError::Io(e) => e,
            ConnectionError::Protocol(ProtocolError::Io(e)) => e,
            _ => return false,
        };
        matches!(
            io_err.kind(),
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
        )
    }
}

/// RESP protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unexpected end of stream")]
    UnexpectedEof,

    #[error("invalid RESP type byte: {0:#04x}")]
    InvalidType(u8),

    #[error("invalid length: {0}")]
    InvalidLength(i64),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse { expected: String, actual: String },

    #[error("server error: {0}")]
    Server(String),
}

/// Cluster topology errors
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("topology query failed: {0}")]
    Query(#[from] ConnectionError),

    #[error("malformed topology reply at {position}: {reason}: {value:?}")]
    MalformedReply {
        position: String,
        reason: String,
        value: RespValue,
    },
}

impl ClusterError {
    pub(crate) fn malformed(position: String, reason: impl Into<String>, value: &RespValue) -> Self {
        ClusterError::MalformedReply {
            position,
            reason: reason.into(),
            value: value.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
