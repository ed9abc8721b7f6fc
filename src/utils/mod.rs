//! Utility modules

pub mod error;
pub mod fail_fast;
pub mod resp;

pub use error::{ClusterError, ConnectionError, Error, ProtocolError, Result};
pub use fail_fast::FailFast;
pub use resp::{RespDecoder, RespEncoder, RespValue};
