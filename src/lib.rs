//! shardwire library
//!
//! Blocking RESP connections with pipelined batches, plus cluster slot
//! ownership resolution built on top of them.

pub mod client;
pub mod cluster;
pub mod config;
pub mod utils;

pub use client::{Batch, CmdBatcher, RedisClient, RedisClientExt, RedisConn};
pub use cluster::{NodeSlotMap, RedisSlots, SlotOwner, SlotRange};
pub use config::{RedisConfig, TlsConfig};
pub use utils::{ClusterError, ConnectionError, Error, FailFast, ProtocolError, RespValue, Result};
