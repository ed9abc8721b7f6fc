//! Capability traits exposed to higher layers
//!
//! `RedisClient` is what sharding and migration code programs against;
//! `RedisConn` is the standalone implementation.

use super::batch::Batch;
use super::connection::RedisConn;
use crate::config::{RedisType, ServiceRewrite};
use crate::utils::{ConnectionError, RespValue};

/// Pipelined command queue
pub trait CmdBatcher {
    /// Queue a command; performs no I/O
    fn put<A: AsRef<[u8]>>(&mut self, cmd: &str, args: &[A]);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send all queued commands and collect one reply per command
    ///
    /// A server error reply does not fail the batch: it arrives as
    /// `RespValue::Error` in its slot, so callers must check each result.
    fn exec(&mut self) -> Result<Vec<RespValue>, ConnectionError>;

    /// Send and flush all queued commands without reading replies
    fn dispatch(&mut self) -> Result<(), ConnectionError>;

    /// Collect the replies owed by the previous `dispatch`
    ///
    /// Must follow a `dispatch` on the same batch; nothing checks that the
    /// stream still holds exactly those replies.
    fn receive(&mut self) -> Result<Vec<RespValue>, ConnectionError>;
}

/// Connection capability set
pub trait RedisClient {
    type Batcher<'a>: CmdBatcher
    where
        Self: 'a;

    /// Issue a command and block for its reply
    fn do_cmd<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<RespValue, ConnectionError>;

    fn send<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<(), ConnectionError>;

    fn send_and_flush<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<(), ConnectionError>;

    fn flush(&self) -> Result<(), ConnectionError>;

    fn receive(&self) -> Result<RespValue, ConnectionError>;

    fn new_batch(&self) -> Self::Batcher<'_>;

    fn close(&self) -> Result<(), ConnectionError>;

    fn addresses(&self) -> &[String];

    fn redis_type(&self) -> RedisType;

    fn external_service(&self) -> Option<&str>;

    fn internal_service(&self) -> Option<&str>;
}

/// Convenience operations built on `RedisClient`
pub trait RedisClientExt: RedisClient {
    /// Receive one reply as a string
    fn receive_string(&self) -> Result<String, ConnectionError> {
        Ok(self.receive()?.into_string()?)
    }

    /// Receive one reply as a boolean
    fn receive_bool(&self) -> Result<bool, ConnectionError> {
        Ok(self.receive()?.into_bool()?)
    }

    /// Address rewrite rule, when both service names are configured
    fn service_rewrite(&self) -> Option<ServiceRewrite> {
        match (self.internal_service(), self.external_service()) {
            (Some(internal), Some(external)) => Some(ServiceRewrite::new(internal, external)),
            _ => None,
        }
    }
}

impl<T: RedisClient + ?Sized> RedisClientExt for T {}

impl RedisClient for RedisConn {
    type Batcher<'a> = Batch<'a>;

    fn do_cmd<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<RespValue, ConnectionError> {
        RedisConn::do_cmd(self, cmd, args)
    }

    fn send<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<(), ConnectionError> {
        RedisConn::send(self, cmd, args)
    }

    fn send_and_flush<A: AsRef<[u8]>>(&self, cmd: &str, args: &[A]) -> Result<(), ConnectionError> {
        RedisConn::send_and_flush(self, cmd, args)
    }

    fn flush(&self) -> Result<(), ConnectionError> {
        RedisConn::flush(self)
    }

    fn receive(&self) -> Result<RespValue, ConnectionError> {
        RedisConn::receive(self)
    }

    fn new_batch(&self) -> Batch<'_> {
        RedisConn::new_batch(self)
    }

    fn close(&self) -> Result<(), ConnectionError> {
        RedisConn::close(self)
    }

    fn addresses(&self) -> &[String] {
        RedisConn::addresses(self)
    }

    fn redis_type(&self) -> RedisType {
        RedisConn::redis_type(self)
    }

    fn external_service(&self) -> Option<&str> {
        RedisConn::external_service(self)
    }

    fn internal_service(&self) -> Option<&str> {
        RedisConn::internal_service(self)
    }
}
