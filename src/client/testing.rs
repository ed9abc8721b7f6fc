//! In-memory transport for driving a connection from scripted replies

use std::io::{self, BufRead, BufReader, Cursor, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use super::connection::RedisConn;
use super::transport::SocketShutdown;
use crate::config::RedisConfig;
use crate::utils::{ConnectionError, RespValue};

/// Serialize reply values the way a server would put them on the wire
pub(crate) fn resp_bytes(values: &[RespValue]) -> Vec<u8> {
    let mut out = Vec::new();
    for v in values {
        write_value(v, &mut out);
    }
    out
}

fn write_value(value: &RespValue, out: &mut Vec<u8>) {
    match value {
        RespValue::Null => out.extend_from_slice(b"$-1\r\n"),
        RespValue::Error(e) => out.extend_from_slice(format!("-{}\r\n", e).as_bytes()),
        RespValue::Integer(i) => out.extend_from_slice(format!(":{}\r\n", i).as_bytes()),
        RespValue::SimpleString(s) => out.extend_from_slice(format!("+{}\r\n", s).as_bytes()),
        RespValue::BulkString(b) => {
            out.extend_from_slice(format!("${}\r\n", b.len()).as_bytes());
            out.extend_from_slice(b);
            out.extend_from_slice(b"\r\n");
        }
        RespValue::Array(items) => {
            out.extend_from_slice(format!("*{}\r\n", items.len()).as_bytes());
            for item in items {
                write_value(item, out);
            }
        }
    }
}

#[derive(Clone, Default)]
pub(crate) struct ScriptHandles {
    written: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
    shut: Arc<AtomicBool>,
    shutdown_calls: Arc<AtomicUsize>,
}

impl ScriptHandles {
    pub(crate) fn written(&self) -> Vec<u8> {
        self.written.lock().clone()
    }

    /// Make every later write fail as if the peer reset the connection
    pub(crate) fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    pub(crate) fn shutdown_calls(&self) -> usize {
        self.shutdown_calls.load(Ordering::SeqCst)
    }
}

/// Reads come from a fixed script; writes are recorded
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    handles: ScriptHandles,
}

impl ScriptedStream {
    pub(crate) fn new(input: Vec<u8>) -> Self {
        Self {
            input: Cursor::new(input),
            handles: ScriptHandles::default(),
        }
    }

    pub(crate) fn handles(&self) -> ScriptHandles {
        self.handles.clone()
    }

    pub(crate) fn establish(self, config: RedisConfig) -> Result<RedisConn, ConnectionError> {
        let shutdown = ScriptedShutdown {
            handles: self.handles.clone(),
        };
        RedisConn::establish(config, Box::new(self), Box::new(shutdown))
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.handles.shut.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket shut down"));
        }
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.handles.shut.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket shut down"));
        }
        if self.handles.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        self.handles.written.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.handles.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"));
        }
        Ok(())
    }
}

struct ScriptedShutdown {
    handles: ScriptHandles,
}

impl SocketShutdown for ScriptedShutdown {
    fn shutdown(&self) -> io::Result<()> {
        self.handles.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        self.handles.shut.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Local server for one client: answers PING with PONG and any other
/// command with its last argument as a bulk string
pub(crate) fn echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        while let Some(args) = read_command(&mut reader) {
            let reply = match args.last() {
                Some(last) if args.len() > 1 => RespValue::BulkString(last.clone()),
                _ => RespValue::SimpleString("PONG".into()),
            };
            if writer.write_all(&resp_bytes(&[reply])).is_err() {
                return;
            }
        }
    });
    addr
}

/// Read one `*N` command of bulk strings; `None` once the client hangs up
fn read_command<R: BufRead>(reader: &mut R) -> Option<Vec<Vec<u8>>> {
    let mut header = String::new();
    if reader.read_line(&mut header).ok()? == 0 {
        return None;
    }
    let count: usize = header.trim_end().strip_prefix('*')?.parse().ok()?;
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        let mut len_line = String::new();
        reader.read_line(&mut len_line).ok()?;
        let len: usize = len_line.trim_end().strip_prefix('$')?.parse().ok()?;
        let mut buf = vec![0u8; len + 2];
        reader.read_exact(&mut buf).ok()?;
        buf.truncate(len);
        args.push(buf);
    }
    Some(args)
}
