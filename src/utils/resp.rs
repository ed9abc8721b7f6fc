//! RESP (Redis Serialization Protocol) encoder and decoder
//!
//! Commands are encoded as arrays of bulk strings into a reusable buffer;
//! replies are decoded one frame at a time from any buffered reader.

use std::io::{BufRead, Read};

use super::error::ProtocolError;

/// Largest bulk string a peer may announce (the server's own proto-max-bulk-len)
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// Largest element count a peer may announce for one array
pub const MAX_ARRAY_LEN: i64 = 1 << 32;

/// Deepest array nesting accepted in one reply
pub const MAX_NESTING_DEPTH: usize = 64;

/// Upper bound on memory reserved before the announced data actually arrives
const MAX_PREALLOC: usize = 64 * 1024;

/// Decoded reply value
///
/// `Null` is the protocol-level "no value" (`$-1` / `*-1`). It is a
/// legitimate reply, never a decode failure.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// Null bulk string or null array
    Null,
    /// Error (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Simple string (+OK\r\n)
    SimpleString(String),
    /// Bulk string ($6\r\nfoobar\r\n)
    BulkString(Vec<u8>),
    /// Array (*2\r\n...)
    Array(Vec<RespValue>),
}

impl RespValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            RespValue::Null => "null",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::SimpleString(_) => "simple-string",
            RespValue::BulkString(_) => "bulk-string",
            RespValue::Array(_) => "array",
        }
    }

    /// Get as string (for simple string or UTF-8 bulk string)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(b) => Some(b),
            RespValue::SimpleString(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RespValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Convert a string-like reply into an owned `String`
    ///
    /// Server error replies become `ProtocolError::Server`.
    pub fn into_string(self) -> Result<String, ProtocolError> {
        match self {
            RespValue::SimpleString(s) => Ok(s),
            RespValue::BulkString(b) => String::from_utf8(b)
                .map_err(|e| ProtocolError::Parse(format!("invalid UTF-8 in bulk string: {}", e))),
            RespValue::Error(e) => Err(ProtocolError::Server(e)),
            other => Err(ProtocolError::UnexpectedResponse {
                expected: "string".to_string(),
                actual: format!("{:?}", other),
            }),
        }
    }

    /// Interpret the reply as a boolean
    ///
    /// Integers are true when non-zero; `OK` is true.
    pub fn into_bool(self) -> Result<bool, ProtocolError> {
        match self {
            RespValue::Integer(i) => Ok(i != 0),
            RespValue::SimpleString(ref s) if s == "OK" => Ok(true),
            RespValue::Null => Ok(false),
            RespValue::Error(e) => Err(ProtocolError::Server(e)),
            other => Err(ProtocolError::UnexpectedResponse {
                expected: "integer or OK".to_string(),
                actual: format!("{:?}", other),
            }),
        }
    }
}

/// RESP encoder with pre-allocated buffer
///
/// Several commands may be encoded back to back; the buffer then holds a
/// whole pipeline until it is drained.
pub struct RespEncoder {
    buf: Vec<u8>,
}

impl RespEncoder {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Clear buffer for reuse
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Encode a command name followed by its arguments
    pub fn encode_parts<A: AsRef<[u8]>>(&mut self, cmd: &str, args: &[A]) {
        self.write_array_header(args.len() + 1);
        self.write_bulk(cmd.as_bytes());
        for arg in args {
            self.write_bulk(arg.as_ref());
        }
    }

    fn write_array_header(&mut self, count: usize) {
        self.buf.push(b'*');
        self.write_int(count as i64);
        self.buf.extend_from_slice(b"\r\n");
    }

    fn write_bulk(&mut self, data: &[u8]) {
        self.buf.push(b'$');
        self.write_int(data.len() as i64);
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(data);
        self.buf.extend_from_slice(b"\r\n");
    }

    #[inline]
    fn write_int(&mut self, value: i64) {
        let mut buffer = itoa::Buffer::new();
        let s = buffer.format(value);
        self.buf.extend_from_slice(s.as_bytes());
    }
}

/// RESP decoder for streaming reads
pub struct RespDecoder<R> {
    reader: R,
    line_buf: Vec<u8>,
}

impl<R: BufRead> RespDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_buf: Vec::with_capacity(256),
        }
    }

    /// Decode next RESP value from stream
    ///
    /// Lengths announced by the peer are bounded before anything is
    /// allocated; an oversized or too deeply nested frame is a protocol error.
    pub fn decode(&mut self) -> Result<RespValue, ProtocolError> {
        self.decode_at(0)
    }

    fn decode_at(&mut self, depth: usize) -> Result<RespValue, ProtocolError> {
        self.read_line()?;

        let type_byte = self.line_buf[0];
        let content = std::str::from_utf8(&self.line_buf[1..])
            .map_err(|_| ProtocolError::Parse("non UTF-8 header line".to_string()))?;

        match type_byte {
            b'+' => Ok(RespValue::SimpleString(content.to_string())),
            b'-' => Ok(RespValue::Error(content.to_string())),
            b':' => {
                let value: i64 = content
                    .parse()
                    .map_err(|_| ProtocolError::Parse(format!("invalid integer: {:?}", content)))?;
                Ok(RespValue::Integer(value))
            }
            b'$' => {
                let len: i64 = content
                    .parse()
                    .map_err(|_| ProtocolError::Parse(format!("invalid bulk length: {:?}", content)))?;
                if len == -1 {
                    return Ok(RespValue::Null);
                }
                if !(0..=MAX_BULK_LEN).contains(&len) {
                    return Err(ProtocolError::InvalidLength(len));
                }

                let data = self.read_bulk(len as u64)?;

                let mut crlf = [0u8; 2];
                self.read_exact(&mut crlf)?;
                if &crlf != b"\r\n" {
                    return Err(ProtocolError::Parse("bulk string not terminated by CRLF".to_string()));
                }

                Ok(RespValue::BulkString(data))
            }
            b'*' => {
                let count: i64 = content
                    .parse()
                    .map_err(|_| ProtocolError::Parse(format!("invalid array length: {:?}", content)))?;
                if count == -1 {
                    return Ok(RespValue::Null);
                }
                if !(0..=MAX_ARRAY_LEN).contains(&count) {
                    return Err(ProtocolError::InvalidLength(count));
                }
                if depth >= MAX_NESTING_DEPTH {
                    return Err(ProtocolError::Parse(format!(
                        "arrays nested deeper than {}",
                        MAX_NESTING_DEPTH
                    )));
                }

                let mut elements = Vec::with_capacity((count as usize).min(1024));
                for _ in 0..count {
                    elements.push(self.decode_at(depth + 1)?);
                }
                Ok(RespValue::Array(elements))
            }
            other => Err(ProtocolError::InvalidType(other)),
        }
    }

    /// Read one CRLF-terminated header line into `line_buf`, without the terminator
    fn read_line(&mut self) -> Result<(), ProtocolError> {
        self.line_buf.clear();
        let n = self.reader.read_until(b'\n', &mut self.line_buf)?;
        if n == 0 || self.line_buf.last() != Some(&b'\n') {
            return Err(ProtocolError::UnexpectedEof);
        }
        self.line_buf.pop();
        if self.line_buf.last() == Some(&b'\r') {
            self.line_buf.pop();
        }
        if self.line_buf.is_empty() {
            return Err(ProtocolError::Parse("empty RESP line".to_string()));
        }
        Ok(())
    }

    /// Read a bulk payload, growing the buffer only as bytes arrive
    fn read_bulk(&mut self, len: u64) -> Result<Vec<u8>, ProtocolError> {
        let mut data = Vec::with_capacity((len as usize).min(MAX_PREALLOC));
        let read = (&mut self.reader).take(len).read_to_end(&mut data)?;
        if (read as u64) < len {
            return Err(ProtocolError::UnexpectedEof);
        }
        Ok(data)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ProtocolError::UnexpectedEof
            } else {
                ProtocolError::Io(e)
            }
        })
    }
}
