use std::net::SocketAddr;
use std::path::Path;

use crate::channel::Channel;
use crate::codec::{CompressionKind, SerializerKind};
use crate::envelope::{Request, Response};
use crate::error::Result;
use crate::transport::{Connector, TcpTransportBuilder, UnixTransportBuilder};

/// Perform a single request/response exchange over a fresh connection
///
/// Connects, sends the request, receives exactly one response and closes the
/// connection. A failure status is returned as a [`Response`], not an error.
pub async fn request<C>(
    connector: &C,
    request: &Request,
    compression: CompressionKind,
    serializer: SerializerKind,
) -> Result<Response>
where
    C: Connector + ?Sized,
{
    let transport = connector.connect().await?;
    let mut channel = Channel::from_transport(transport, compression, serializer);
    channel.send_request(request).await?;
    let response = channel.receive_response().await?;
    if let Err(e) = channel.close().await {
        // The server hangs up right after answering, so a failed shutdown is expected noise
        tracing::debug!(error = %e, "closing channel after response");
    }
    Ok(response)
}

/// Perform a one-off TCP request/response
pub async fn request_tcp(
    addr: SocketAddr,
    req: &Request,
    compression: CompressionKind,
    serializer: SerializerKind,
) -> Result<Response> {
    let connector = TcpTransportBuilder::new().address(addr);
    request(&connector, req, compression, serializer).await
}

/// Perform a one-off Unix socket request/response
pub async fn request_unix(
    path: impl AsRef<Path>,
    req: &Request,
    compression: CompressionKind,
    serializer: SerializerKind,
) -> Result<Response> {
    let connector = UnixTransportBuilder::new().path(path);
    request(&connector, req, compression, serializer).await
}
