//! Pipelined command batches
//!
//! A batch queues commands without I/O, then sends them all, flushes once
//! and reads the replies in order while holding the connection lock for
//! the whole round trip.
//!
//! Outcome is all-or-nothing: either every queued command yields a reply
//! (`RespValue::Null` included) or the call fails and the connection is
//! closed.

use super::connection::{RedisConn, Wire};
use super::traits::CmdBatcher;
use crate::utils::{ConnectionError, FailFast, RespValue};

struct QueuedCmd {
    name: String,
    args: Vec<Vec<u8>>,
}

/// Command queue bound to one connection
///
/// Not synchronized: populate it from a single owner before running it.
pub struct Batch<'a> {
    conn: &'a RedisConn,
    cmds: Vec<QueuedCmd>,
    /// Replies owed by the last `dispatch`
    in_flight: usize,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(conn: &'a RedisConn) -> Self {
        Self {
            conn,
            cmds: Vec::new(),
            in_flight: 0,
        }
    }

    /// Send every queued command, skipping the rest after the first failure,
    /// and always attempt the flush
    fn write_all(wire: &mut Wire, cmds: &[QueuedCmd]) -> Result<(), ConnectionError> {
        let mut exec = FailFast::new();
        for cmd in cmds {
            exec.step(|| wire.send(&cmd.name, cmd.args.as_slice()));
        }
        exec.finish(|| wire.flush())
    }

    fn read_all(wire: &mut Wire, count: usize) -> Result<Vec<RespValue>, ConnectionError> {
        let mut replies = Vec::with_capacity(count);
        for _ in 0..count {
            replies.push(wire.receive()?);
        }
        Ok(replies)
    }
}

impl CmdBatcher for Batch<'_> {
    fn put<A: AsRef<[u8]>>(&mut self, cmd: &str, args: &[A]) {
        self.cmds.push(QueuedCmd {
            name: cmd.to_string(),
            args: args.iter().map(|a| a.as_ref().to_vec()).collect(),
        });
    }

    fn len(&self) -> usize {
        self.cmds.len()
    }

    fn exec(&mut self) -> Result<Vec<RespValue>, ConnectionError> {
        let cmds = std::mem::take(&mut self.cmds);
        self.conn.with_wire(|wire| {
            Self::write_all(wire, &cmds)?;
            Self::read_all(wire, cmds.len())
        })
    }

    fn dispatch(&mut self) -> Result<(), ConnectionError> {
        let cmds = std::mem::take(&mut self.cmds);
        self.conn.with_wire(|wire| Self::write_all(wire, &cmds))?;
        self.in_flight += cmds.len();
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<RespValue>, ConnectionError> {
        let count = std::mem::take(&mut self.in_flight);
        self.conn.with_wire(|wire| Self::read_all(wire, count))
    }
}
