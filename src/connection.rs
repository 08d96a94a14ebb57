//! Line-oriented connection halves
//!
//! `LineReader` and `LineWriter` wrap the two halves of a byte stream.
//! They are generic so the same code drives `TcpStream` halves and
//! in-memory `tokio::io::duplex` pipes in tests.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter, Lines};

/// Reading half of a connection
#[derive(Debug)]
pub struct LineReader<R> {
    lines: Lines<BufReader<R>>,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            lines: BufReader::new(inner).lines(),
        }
    }

    /// Read the next line without its terminator.
    ///
    /// Returns `Ok(None)` once the peer has closed its side. Cancel safe.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        self.lines.next_line().await
    }
}

/// Writing half of a connection
///
/// `write_line` only buffers; nothing reaches the peer until `flush`.
#[derive(Debug)]
pub struct LineWriter<W> {
    inner: BufWriter<W>,
    closed: bool,
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
            closed: false,
        }
    }

    /// Buffer `line` followed by a newline.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        self.inner.write_all(line.as_bytes()).await?;
        self.inner.write_all(b"\n").await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::from(io::ErrorKind::NotConnected));
        }
        self.inner.flush().await
    }

    /// Write one line and flush it.
    pub async fn send_line(&mut self, line: &str) -> io::Result<()> {
        self.write_line(line).await?;
        self.flush().await
    }

    /// Flush what is buffered and shut the write side down.
    ///
    /// Safe to call more than once; only the first call touches the stream.
    pub async fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.inner.shutdown().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
