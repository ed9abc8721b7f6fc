//! Client connection layer

pub mod batch;
pub mod connection;
pub mod traits;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::Batch;
pub use connection::{RedisConn, READER_BUFFER_SIZE, WRITER_BUFFER_SIZE};
pub use traits::{CmdBatcher, RedisClient, RedisClientExt};
pub use transport::{SocketShutdown, Transport};
