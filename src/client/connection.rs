//! Single-socket RESP connection with handshake and serialized access
//!
//! Every operation that touches the stream runs under one mutex, so a
//! request/response cycle (or a whole pipeline, see [`Batch`]) is never
//! interleaved with another caller's traffic.
//!
//! Any transport or protocol failure while sending, flushing or receiving
//! closes the connection: a partially written or partially read stream
//! cannot be resynchronized. Server error replies (`-ERR ...`) are ordinary
//! values and leave the connection usable.
//!
//! Socket reads and writes carry no deadline unless `read_timeout_ms` /
//! `write_timeout_ms` are configured. Without them a stalled peer blocks the
//! lock holder, and every other caller of this connection, indefinitely.

use std::io::{BufReader, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::batch::Batch;
use super::transport::{self, Dialed, SocketShutdown, Transport};
use crate::config::{RedisConfig, RedisType};
use crate::utils::{ConnectionError, RespDecoder, RespEncoder, RespValue};

pub const READER_BUFFER_SIZE: usize = 512 * 1024;
pub const WRITER_BUFFER_SIZE: usize = 1024 * 1024;

/// Buffered reader/writer pair over the socket
///
/// Encoded commands accumulate in `encoder` and reach the socket once the
/// buffer passes `WRITER_BUFFER_SIZE` or on an explicit flush.
pub(crate) struct Wire {
    reader: BufReader<Box<dyn Transport>>,
    encoder: RespEncoder,
}

impl Wire {
    fn new(stream: Box<dyn Transport>) -> Self {
        Self {
            reader: BufReader::with_capacity(READER_BUFFER_SIZE, stream),
            encoder: RespEncoder::with_capacity(16 * 1024),
        }
    }

    pub(crate) fn send<A: AsRef<[u8]>>(&mut self, cmd: &str, args: &[A]) -> Result<(), ConnectionError> {
        self.encoder.encode_parts(cmd, args);
        if self.encoder.len() >= WRITER_BUFFER_SIZE {
            self.drain()?;
        }
        Ok(())
    }

    pub(crate) fn flush(&mut self) -> Result<(), ConnectionError> {
        self.drain()?;
        self.reader.get_mut().flush()?;
        Ok(())
    }

    pub(crate) fn receive(&mut self) -> Result<RespValue, ConnectionError> {
        let mut decoder = RespDecoder::new(&mut self.reader);
        Ok(decoder.decode()?)
    }

    fn drain(&mut self) -> Result<(), ConnectionError> {
        if self.encoder.is_empty() {
            return Ok(());
        }
        let res = self.reader.get_mut().write_all(self.encoder.as_bytes());
        self.encoder.clear();
        res.map_err(ConnectionError::from)
    }
}

/// Connection to one node
///
/// Lifecycle: dial, optional AUTH, PING, ready, closed. Construction only
/// returns a connection that passed the whole handshake.
pub struct RedisConn {
    wire: Mutex<Wire>,
    shutdown: Box<dyn SocketShutdown>,
    closed: AtomicBool,
    config: RedisConfig,
}

impl RedisConn {
    /// Dial `config.addresses[0]` and run the handshake
    pub fn connect(config: RedisConfig) -> Result<Self, ConnectionError> {
        let Dialed { stream, shutdown } = transport::dial(&config)?;
        Self::establish(config, stream, shutdown)
    }

    /// Run the handshake over an already connected transport
    ///
    /// On failure the transport is shut down before the error is returned.
    pub(crate) fn establish(
        config: RedisConfig,
        stream: Box<dyn Transport>,
        shutdown: Box<dyn SocketShutdown>,
    ) -> Result<Self, ConnectionError> {
        let conn = Self {
            wire: Mutex::new(Wire::new(stream)),
            shutdown,
            closed: AtomicBool::new(false),
            config,
        };

        if let Err(e) = conn.handshake() {
            debug!("handshake with {} failed: {}", conn.display_address(), e);
            let _ = conn.close();
            return Err(e);
        }
        Ok(conn)
    }

    fn handshake(&self) -> Result<(), ConnectionError> {
        let address = self.display_address().to_string();

        if let Some((password, username)) = self.config.credentials() {
            let reply = match username {
                Some(user) => self.do_cmd("AUTH", &[user, password]),
                None => self.do_cmd("AUTH", &[password]),
            }
            .map_err(|e| ConnectionError::AuthFailed {
                address: address.clone(),
                reason: e.to_string(),
            })?;

            match reply {
                RespValue::SimpleString(s) if s == "OK" => {}
                RespValue::Error(e) => {
                    return Err(ConnectionError::AuthFailed { address, reason: e });
                }
                other => {
                    return Err(ConnectionError::AuthFailed {
                        address,
                        reason: format!("unexpected reply: {:?}", other),
                    });
                }
            }
        }

        let reply = self
            .do_cmd::<&str>("PING", &[])
            .map_err(|e| ConnectionError::PingFailed {
                address: address.clone(),
                reason: e.to_string(),
            })?;
        match reply {
            RespValue::SimpleString(s) if s == "PONG" => {
                debug!("connection to {} ready", address);
                Ok(())
            }
            other => Err(ConnectionError::PingFailed {
                address,
                reason: format!("unexpected reply: {:?}", other),
            }),
        }
    }

    fn display_address(&self) -> &str {
        self.config.address().unwrap_or("<none>")
    }

    /// Lock the stream for one operation or one whole pipeline
    pub(crate) fn lock_wire(&self) -> Result<MutexGuard<'_, Wire>, ConnectionError> {
        let wire = self.wire.lock();
        if self.is_closed() {
            return Err(ConnectionError::Closed);
        }
        Ok(wire)
    }

    /// Run `op` under the lock; any error closes the connection
    pub(crate) fn with_wire<T, F>(&self, op: F) -> Result<T, ConnectionError>
    where
        F: FnOnce(&mut Wire) -> Result<T, ConnectionError>,
    {
        let mut wire = self.lock_wire()?;
        op(&mut wire).map_err(|e| {
            self.abort(&e);
            e
        })
    }

    fn abort(&self, err: &ConnectionError) {
        if !self.is_closed() {
            debug!("closing connection to {} after error: {}", self.display_address(), err);
        }
        let _ = self.close();
    }

    /// Send one command, flush, and block for its reply
    pub fn do_cmd<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<RespValue, ConnectionError> {
        self.with_wire(|wire| {
            wire.send(cmd, args)?;
            wire.flush()?;
            wire.receive()
        })
    }

    /// Queue one command without flushing
    pub fn send<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<(), ConnectionError> {
        self.with_wire(|wire| wire.send(cmd, args))
    }

    pub fn send_and_flush<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<(), ConnectionError> {
        self.with_wire(|wire| {
            wire.send(cmd, args)?;
            wire.flush()
        })
    }

    pub fn flush(&self) -> Result<(), ConnectionError> {
        self.with_wire(|wire| wire.flush())
    }

    /// Block for one reply
    pub fn receive(&self) -> Result<RespValue, ConnectionError> {
        self.with_wire(|wire| wire.receive())
    }

    /// Open a pipeline bound to this connection; no lock is taken until it runs
    pub fn new_batch(&self) -> Batch<'_> {
        Batch::new(self)
    }

    /// Close the socket; only the first call has any effect
    ///
    /// Callers blocked on the socket are woken with a transport error.
    pub fn close(&self) -> Result<(), ConnectionError> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Err(e) = self.shutdown.shutdown() {
                warn!("close connection to {} failed: {}", self.display_address(), e);
                return Err(e.into());
            }
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn redis_type(&self) -> RedisType {
        RedisType::Standalone
    }

    pub fn addresses(&self) -> &[String] {
        &self.config.addresses
    }

    pub fn external_service(&self) -> Option<&str> {
        self.config.external_service.as_deref()
    }

    pub fn internal_service(&self) -> Option<&str> {
        self.config.internal_service.as_deref()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}
