use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::transport::{with_timeout, Connection, Connector, FrameReader, FrameWriter, Transport};

/// TCP transport carrying header-framed messages
pub struct TcpTransport {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl TcpTransport {
    /// Connect to a remote TCP address with no timeouts
    pub async fn connect(addr: impl ToString) -> Result<Self> {
        Self::builder().address(addr).connect().await
    }

    /// Connect with a connect timeout
    pub async fn connect_timeout(addr: impl ToString, timeout: Duration) -> Result<Self> {
        Self::builder()
            .address(addr)
            .connect_timeout(timeout)
            .connect()
            .await
    }

    /// Create a builder for configuring the transport
    pub fn builder() -> TcpTransportBuilder {
        TcpTransportBuilder::new()
    }

    /// Create from an existing TcpStream
    pub fn from_stream(stream: TcpStream) -> Self {
        let (read, write) = stream.into_split();
        Self {
            reader: FrameReader::new(read),
            writer: FrameWriter::new(write),
            send_timeout: None,
            receive_timeout: None,
        }
    }

    /// Get the remote address of this connection
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.reader.get_ref().peer_addr().map_err(Into::into)
    }

    /// Get the local address of this connection
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.reader.get_ref().local_addr().map_err(Into::into)
    }

    /// Split into independently owned halves
    pub fn into_connection(self) -> Connection<OwnedReadHalf, OwnedWriteHalf> {
        let peer = self
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        Connection {
            reader: self.reader,
            writer: self.writer,
            peer,
        }
    }
}

#[async_trait::async_trait]
impl Transport for TcpTransport {
    async fn send(&mut self, frame: &Frame) -> Result<()> {
        with_timeout(self.send_timeout, "Send", self.writer.write_frame(frame)).await
    }

    async fn receive(&mut self) -> Result<Frame> {
        with_timeout(self.receive_timeout, "Receive", self.reader.read_frame()).await
    }

    async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await
    }
}

/// TCP listener for accepting incoming connections
pub struct TcpTransportListener {
    listener: TcpListener,
}

impl TcpTransportListener {
    /// Bind to a local address
    pub async fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// Get the local address this listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(Into::into)
    }
}

#[async_trait::async_trait]
impl crate::transport::TransportListener for TcpTransportListener {
    type Reader = OwnedReadHalf;
    type Writer = OwnedWriteHalf;

    async fn accept(&self) -> Result<Connection<OwnedReadHalf, OwnedWriteHalf>> {
        let (stream, _) = self.listener.accept().await?;
        Ok(TcpTransport::from_stream(stream).into_connection())
    }

    async fn close(&mut self) -> Result<()> {
        // TcpListener cleanup happens on drop
        Ok(())
    }
}

/// Builder for configuring TCP transport
#[derive(Debug, Clone, Default)]
pub struct TcpTransportBuilder {
    address: Option<String>,
    connect_timeout: Option<Duration>,
    send_timeout: Option<Duration>,
    receive_timeout: Option<Duration>,
}

impl TcpTransportBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the address to connect to (`host:port`)
    pub fn address(mut self, addr: impl ToString) -> Self {
        self.address = Some(addr.to_string());
        self
    }

    /// Set the connection timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the send timeout
    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = Some(timeout);
        self
    }

    /// Set the receive timeout
    pub fn receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = Some(timeout);
        self
    }

    /// Connect with the configured settings
    pub async fn connect(self) -> Result<TcpTransport> {
        let addr = self
            .address
            .ok_or_else(|| Error::Transport("Address not set".to_string()))?;

        let stream = with_timeout(self.connect_timeout, "Connect", async {
            TcpStream::connect(addr.as_str()).await.map_err(Error::from)
        })
        .await?;

        let mut transport = TcpTransport::from_stream(stream);
        transport.send_timeout = self.send_timeout;
        transport.receive_timeout = self.receive_timeout;
        Ok(transport)
    }
}

#[async_trait::async_trait]
impl Connector for TcpTransportBuilder {
    type Transport = TcpTransport;

    async fn connect(&self) -> Result<TcpTransport> {
        self.clone().connect().await
    }
}
