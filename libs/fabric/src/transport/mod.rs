use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::frame::{Frame, Header, HEADER_LEN, MAX_FRAME_LEN};

pub mod tcp;
pub mod unix;

pub use self::tcp::{TcpTransport, TcpTransportBuilder, TcpTransportListener};
pub use self::unix::{UnixTransport, UnixTransportBuilder, UnixTransportListener};

/// Transport trait for sending and receiving frames
///
/// Each transport instance represents a single connection.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Send a frame over the transport
    async fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Receive the next frame from the transport
    async fn receive(&mut self) -> Result<Frame>;

    /// Close the transport connection
    async fn close(&mut self) -> Result<()>;
}

/// Listener handing out accepted connections already split into halves
#[async_trait::async_trait]
pub trait TransportListener: Send + Sync {
    type Reader: AsyncRead + Send + Unpin + 'static;
    type Writer: AsyncWrite + Send + Unpin + 'static;

    /// Accept an incoming connection
    async fn accept(&self) -> Result<Connection<Self::Reader, Self::Writer>>;

    /// Stop listening
    async fn close(&mut self) -> Result<()>;
}

/// Something that can open a fresh transport on demand
///
/// The retrying client dials through this, one connection per attempt.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Transport: Transport;

    async fn connect(&self) -> Result<Self::Transport>;
}

/// An accepted connection, split so reading and writing can run in separate tasks
pub struct Connection<R, W> {
    pub reader: FrameReader<R>,
    pub writer: FrameWriter<W>,
    /// Printable peer address, for logs
    pub peer: String,
}

/// Reads whole frames from a byte stream
pub struct FrameReader<R> {
    inner: R,
    max_frame_len: u32,
}

impl<R: AsyncRead + Unpin + Send> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            max_frame_len: MAX_FRAME_LEN,
        }
    }

    /// Reject frames whose length field exceeds `max_frame_len`
    pub fn with_max_frame_len(mut self, max_frame_len: u32) -> Self {
        self.max_frame_len = max_frame_len;
        self
    }

    /// Read one frame
    ///
    /// A stream that ends before the first header byte yields
    /// [`Error::ConnectionClosed`]; one that ends inside a frame yields
    /// [`Error::Protocol`].
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let (header, frame_len) = self.read_header().await?;
        self.read_body(header, frame_len).await
    }

    /// Read and parse the next header, returning it with the announced frame length
    pub async fn read_header(&mut self) -> Result<(Header, u32)> {
        let mut head = [0u8; HEADER_LEN];

        let first = self.inner.read(&mut head).await?;
        if first == 0 {
            return Err(Error::ConnectionClosed);
        }
        if first < HEADER_LEN {
            self.inner
                .read_exact(&mut head[first..])
                .await
                .map_err(|e| truncated(e, "header"))?;
        }

        Header::parse(&head)
    }

    /// Read the body announced by a header from [`read_header`](Self::read_header)
    ///
    /// Frames over the reader's limit are rejected before the body is allocated.
    pub async fn read_body(&mut self, header: Header, frame_len: u32) -> Result<Frame> {
        if frame_len > self.max_frame_len {
            return Err(Error::Protocol(format!(
                "frame too large: {} bytes (limit {})",
                frame_len, self.max_frame_len
            )));
        }

        let body_len = (frame_len as usize).checked_sub(HEADER_LEN).ok_or_else(|| {
            Error::Protocol(format!(
                "frame length {} is shorter than the {} byte header",
                frame_len, HEADER_LEN
            ))
        })?;
        let mut body = vec![0u8; body_len];
        self.inner
            .read_exact(&mut body)
            .await
            .map_err(|e| truncated(e, "body"))?;

        Ok(Frame::new(header, body))
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }
}

/// Writes whole frames to a byte stream
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let header = frame.header_bytes()?;
        self.inner.write_all(&header).await?;
        self.inner.write_all(&frame.body).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }
}

fn truncated(e: std::io::Error, part: &str) -> Error {
    if e.kind() == ErrorKind::UnexpectedEof {
        Error::Protocol(format!("connection closed inside frame {}", part))
    } else {
        e.into()
    }
}

/// Run `op` under an optional deadline, naming the operation on expiry
pub(crate) async fn with_timeout<T>(
    timeout: Option<std::time::Duration>,
    what: &str,
    op: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, op)
            .await
            .map_err(|_| Error::Transport(format!("{} timeout exceeded", what)))?,
        None => op.await,
    }
}
