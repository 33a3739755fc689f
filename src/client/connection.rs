//! Connection handling
//!
//! Frames commands onto a byte stream and reads RESP replies back.

use crate::error::{Error, Result};
use crate::protocol::{Cmd, FrameScanner, RespEncoder, RespError, RespParser, RespValue};
use bytes::BytesMut;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;
use tracing::trace;

/// Connection over any async byte stream
pub struct Connection<S> {
    /// Underlying stream
    stream: S,

    /// Read buffer
    read_buffer: BytesMut,

    /// Write buffer
    write_buffer: BytesMut,

    /// Progress through the reply at the front of the read buffer
    scanner: FrameScanner,
}

impl<S: AsyncRead + AsyncWrite + Unpin> Connection<S> {
    /// Create a new connection
    pub fn new(stream: S) -> Self {
        Connection {
            stream,
            read_buffer: BytesMut::with_capacity(4096),
            write_buffer: BytesMut::with_capacity(4096),
            scanner: FrameScanner::new(),
        }
    }

    /// Encode commands and write them in one go
    pub async fn send(&mut self, cmds: &[Cmd]) -> Result<()> {
        self.write_buffer.clear();
        for cmd in cmds {
            RespEncoder::encode_command(&mut self.write_buffer, cmd);
        }
        trace!("Sending {} commands ({} bytes)", cmds.len(), self.write_buffer.len());

        self.stream.write_all(&self.write_buffer).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read the next complete reply
    ///
    /// The reply is only parsed once all of its bytes have arrived.
    pub async fn read_reply(&mut self) -> Result<RespValue> {
        loop {
            if let Some(len) = self.scanner.advance(&self.read_buffer)? {
                let mut frame = self.read_buffer.split_to(len);
                let value = RespParser::parse(&mut frame)?.ok_or_else(|| {
                    RespError::InvalidProtocol(format!("Incomplete reply of {} bytes", len))
                })?;
                trace!("Reply: {}", value);
                return Ok(value);
            }

            let n = self.stream.read_buf(&mut self.read_buffer).await?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
        }
    }

    /// Read `count` replies in order
    pub async fn read_replies(&mut self, count: usize) -> Result<Vec<RespValue>> {
        let mut replies = Vec::with_capacity(count);
        for _ in 0..count {
            replies.push(self.read_reply().await?);
        }
        Ok(replies)
    }
}

/// TCP or Unix socket stream
pub enum Transport {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl AsyncRead for Transport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Transport::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Transport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Transport::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Transport::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Transport::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Transport::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}
