use std::net::SocketAddr;
use std::path::Path;

use crate::codec::{CompressionKind, SerializerKind};
use crate::envelope::{Request, Response};
use crate::error::{Error, Result};
use crate::frame::{Frame, MessageKind};
use crate::transport::{TcpTransport, Transport, UnixTransport};

/// Client side of one connection
///
/// Combines a transport with the compression and serializer tags both peers
/// agreed on. The server answers one request per connection, so a channel is
/// good for a single exchange.
pub struct Channel<T> {
    transport: T,
    compression: CompressionKind,
    serializer: SerializerKind,
}

impl<T: Transport> Channel<T> {
    /// Create a channel from an existing transport
    pub fn from_transport(
        transport: T,
        compression: CompressionKind,
        serializer: SerializerKind,
    ) -> Self {
        Self {
            transport,
            compression,
            serializer,
        }
    }

    /// Send a request frame
    pub async fn send_request(&mut self, request: &Request) -> Result<()> {
        let frame = Frame::request(request, self.compression, self.serializer)?;
        self.transport.send(&frame).await
    }

    /// Receive exactly one response frame
    pub async fn receive_response(&mut self) -> Result<Response> {
        let frame = self.transport.receive().await?;
        frame.decode_response()
    }

    /// Send a ping and wait for the matching pong
    pub async fn ping(&mut self, request_id: u64) -> Result<()> {
        self.transport.send(&Frame::ping(request_id)).await?;
        let frame = self.transport.receive().await?;
        match frame.header.kind {
            MessageKind::Pong if frame.header.request_id == request_id => Ok(()),
            MessageKind::Pong => Err(Error::Protocol(format!(
                "pong for request {} answered ping {}",
                frame.header.request_id, request_id
            ))),
            // A failed ping comes back as a response carrying the reason
            MessageKind::Response => frame.decode_response()?.into_result().map(|_| ()),
            other => Err(Error::Protocol(format!(
                "expected a Pong frame, got {:?}",
                other
            ))),
        }
    }

    /// Close the channel
    pub async fn close(mut self) -> Result<()> {
        self.transport.close().await
    }
}

impl Channel<TcpTransport> {
    /// Open a TCP channel
    pub async fn tcp(
        addr: SocketAddr,
        compression: CompressionKind,
        serializer: SerializerKind,
    ) -> Result<Self> {
        let transport = TcpTransport::connect(addr).await?;
        Ok(Self::from_transport(transport, compression, serializer))
    }
}

impl Channel<UnixTransport> {
    /// Open a Unix socket channel
    pub async fn unix(
        path: impl AsRef<Path>,
        compression: CompressionKind,
        serializer: SerializerKind,
    ) -> Result<Self> {
        let transport = UnixTransport::connect(path).await?;
        Ok(Self::from_transport(transport, compression, serializer))
    }
}
