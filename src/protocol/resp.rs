//! RESP2 parser and encoder
//!
//! Parses server replies from a read buffer and encodes outgoing commands.
//! [`FrameScanner`] finds where a reply ends without building it, so a reply
//! arriving in many chunks is walked once and parsed once.

use super::types::{Cmd, RespError, RespValue};
use bytes::{Buf, BufMut, Bytes, BytesMut};

const CRLF: &[u8] = b"\r\n";

/// Largest bulk string a server may send (the Redis string size limit)
const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// RESP2 Parser
pub struct RespParser;

impl RespParser {
    /// Parse one RESP value from the front of a buffer
    ///
    /// Returns Ok(Some(value)) and consumes the bytes if a complete value was
    /// parsed, Ok(None) without consuming anything if more data is needed,
    /// Err(e) if the data is malformed.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        match Self::parse_at(buf, 0)? {
            Some((value, end)) => {
                buf.advance(end);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Parse a value starting at `pos`, returning it with the offset just past it
    fn parse_at(buf: &[u8], pos: usize) -> Result<Option<(RespValue, usize)>, RespError> {
        let (line, next) = match Self::line_at(buf, pos) {
            Some(found) => found,
            None => return Ok(None),
        };
        if line.is_empty() {
            return Err(RespError::InvalidProtocol("Empty line".to_string()));
        }

        let body = &line[1..];
        match line[0] {
            b'+' => {
                let s = std::str::from_utf8(body).map_err(|_| RespError::InvalidUtf8)?;
                Ok(Some((RespValue::SimpleString(s.to_string()), next)))
            }
            b'-' => {
                let s = std::str::from_utf8(body).map_err(|_| RespError::InvalidUtf8)?;
                Ok(Some((RespValue::Error(s.to_string()), next)))
            }
            b':' => Ok(Some((RespValue::Integer(Self::number(body)?), next))),
            b'$' => Self::parse_bulk_string(buf, body, next),
            b'*' => Self::parse_array(buf, body, next),
            other => Err(RespError::InvalidProtocol(format!(
                "Unknown type prefix: {}",
                other as char
            ))),
        }
    }

    /// Parse bulk string payload: $6\r\nfoobar\r\n or $-1\r\n (null)
    fn parse_bulk_string(
        buf: &[u8],
        header: &[u8],
        start: usize,
    ) -> Result<Option<(RespValue, usize)>, RespError> {
        let len = Self::number(header)?;
        if len == -1 {
            return Ok(Some((RespValue::Null, start)));
        }
        if len < 0 {
            return Err(RespError::InvalidProtocol(format!(
                "Invalid bulk string length: {}",
                len
            )));
        }

        let end = Self::bulk_end(start, len)?;
        if buf.len() < end + 2 {
            return Ok(None);
        }
        if &buf[end..end + 2] != CRLF {
            return Err(RespError::InvalidProtocol(
                "Missing CRLF after bulk string data".to_string(),
            ));
        }

        let data = Bytes::copy_from_slice(&buf[start..end]);
        Ok(Some((RespValue::BulkString(data), end + 2)))
    }

    /// Parse array elements: *2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n or *-1\r\n (null)
    fn parse_array(
        buf: &[u8],
        header: &[u8],
        start: usize,
    ) -> Result<Option<(RespValue, usize)>, RespError> {
        let count = Self::number(header)?;
        if count == -1 {
            return Ok(Some((RespValue::Null, start)));
        }
        if count < 0 {
            return Err(RespError::InvalidProtocol(format!(
                "Invalid array count: {}",
                count
            )));
        }

        // Nothing is consumed until every element is available
        let mut elements = Vec::with_capacity((count as usize).min(1024));
        let mut pos = start;
        for _ in 0..count {
            match Self::parse_at(buf, pos)? {
                Some((value, next)) => {
                    elements.push(value);
                    pos = next;
                }
                None => return Ok(None),
            }
        }

        Ok(Some((RespValue::Array(elements), pos)))
    }

    /// Find the line starting at `pos`; returns it without CRLF and the offset after CRLF
    fn line_at(buf: &[u8], pos: usize) -> Option<(&[u8], usize)> {
        let rest = buf.get(pos..)?;
        rest.windows(2)
            .position(|w| w == CRLF)
            .map(|i| (&rest[..i], pos + i + 2))
    }

    /// Offset just past the payload of a bulk string of `len` bytes
    fn bulk_end(start: usize, len: i64) -> Result<usize, RespError> {
        usize::try_from(len)
            .ok()
            .filter(|&len| len <= MAX_BULK_LEN)
            .and_then(|len| start.checked_add(len))
            .filter(|end| end.checked_add(2).is_some())
            .ok_or_else(|| {
                RespError::InvalidProtocol(format!("Bulk string length out of range: {}", len))
            })
    }

    fn number(digits: &[u8]) -> Result<i64, RespError> {
        let s = std::str::from_utf8(digits).map_err(|_| RespError::InvalidUtf8)?;
        s.parse::<i64>().map_err(|_| RespError::IntegerOverflow)
    }
}

/// Resumable search for the end of one reply
///
/// Remembers how far the buffer has been walked and how many elements each
/// open array still expects, so new data only costs the new bytes. The
/// buffer must not be consumed between calls until a frame is reported.
#[derive(Debug, Default)]
pub struct FrameScanner {
    /// Start of the first element not yet walked
    offset: usize,

    /// Remaining element counts of the open arrays, innermost last
    pending: Vec<usize>,
}

impl FrameScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue walking `buf`
    ///
    /// Returns Ok(Some(len)) once the first `len` bytes hold a complete reply
    /// and resets for the next one. Ok(None) means more data is needed.
    pub fn advance(&mut self, buf: &[u8]) -> Result<Option<usize>, RespError> {
        loop {
            let (line, next) = match RespParser::line_at(buf, self.offset) {
                Some(found) => found,
                None => return Ok(None),
            };
            if line.is_empty() {
                return Err(RespError::InvalidProtocol("Empty line".to_string()));
            }

            match line[0] {
                b'+' | b'-' | b':' => self.offset = next,
                b'$' => {
                    let len = RespParser::number(&line[1..])?;
                    if len == -1 {
                        self.offset = next;
                    } else if len < 0 {
                        return Err(RespError::InvalidProtocol(format!(
                            "Invalid bulk string length: {}",
                            len
                        )));
                    } else {
                        let end = RespParser::bulk_end(next, len)?;
                        if buf.len() < end + 2 {
                            return Ok(None);
                        }
                        self.offset = end + 2;
                    }
                }
                b'*' => {
                    let count = RespParser::number(&line[1..])?;
                    if count < -1 {
                        return Err(RespError::InvalidProtocol(format!(
                            "Invalid array count: {}",
                            count
                        )));
                    }
                    self.offset = next;
                    if count > 0 {
                        let count = usize::try_from(count).map_err(|_| RespError::IntegerOverflow)?;
                        self.pending.push(count);
                        continue;
                    }
                }
                other => {
                    return Err(RespError::InvalidProtocol(format!(
                        "Unknown type prefix: {}",
                        other as char
                    )))
                }
            }

            if self.element_done() {
                return Ok(Some(std::mem::take(&mut self.offset)));
            }
        }
    }

    /// Count one finished element against the open arrays; true when the
    /// outermost value is complete
    fn element_done(&mut self) -> bool {
        while let Some(remaining) = self.pending.last_mut() {
            *remaining -= 1;
            if *remaining > 0 {
                return false;
            }
            self.pending.pop();
        }
        true
    }
}

/// RESP2 Encoder
pub struct RespEncoder;

impl RespEncoder {
    /// Encode a command as an array of bulk strings into an existing buffer
    pub fn encode_command(buf: &mut BytesMut, cmd: &Cmd) {
        buf.put_u8(b'*');
        buf.put_slice((cmd.args().len() + 1).to_string().as_bytes());
        buf.put_slice(CRLF);
        Self::put_bulk(buf, cmd.name().as_bytes());
        for arg in cmd.args() {
            Self::put_bulk(buf, arg);
        }
    }

    fn put_bulk(buf: &mut BytesMut, bytes: &[u8]) {
        buf.put_u8(b'$');
        buf.put_slice(bytes.len().to_string().as_bytes());
        buf.put_slice(CRLF);
        buf.put_slice(bytes);
        buf.put_slice(CRLF);
    }
}
