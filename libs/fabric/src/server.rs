use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::ToSocketAddrs;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::codec::{CompressionKind, SerializerKind};
use crate::envelope::{Request, Response};
use crate::error::{DispatchError, Error, Result};
use crate::frame::{Frame, MessageKind};
use crate::registry::{Registry, Service};
use crate::transport::{Connection, FrameReader, FrameWriter, TcpTransportListener, TransportListener};

/// Pause after a failed accept before trying again
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(50);

/// RPC server answering one request per accepted connection
///
/// Each connection runs two tasks: one reads the request frame and dispatches
/// it, the other waits for the outcome on a single-use channel and writes it
/// back. The socket is closed once the response is sent.
///
/// ```no_run
/// use std::convert::Infallible;
/// use courier_fabric::{registry::Service, Server};
///
/// # async fn example() -> courier_fabric::Result<()> {
/// let mut server = Server::new();
/// server.register(
///     "echo",
///     Service::new().method("Upper", |s: String| Ok::<_, Infallible>(s.to_uppercase())),
/// );
///
/// let stop = server.stop_handle();
/// tokio::spawn(async move {
///     tokio::signal::ctrl_c().await.ok();
///     stop.stop();
/// });
///
/// server.run("127.0.0.1:9222").await
/// # }
/// ```
#[derive(Default)]
pub struct Server {
    registry: Registry,
    shutdown: CancellationToken,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a server around an already populated registry
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            shutdown: CancellationToken::new(),
        }
    }

    /// Register a service under `name`
    pub fn register(&mut self, name: impl Into<String>, service: Service) -> &mut Self {
        self.registry.register(name, service);
        self
    }

    /// Handle that stops the accept loop from another task
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            token: self.shutdown.clone(),
        }
    }

    /// Bind a TCP listener on `addr` and serve until stopped
    pub async fn run(self, addr: impl ToSocketAddrs) -> Result<()> {
        let listener = TcpTransportListener::bind(addr).await?;
        tracing::info!(addr = ?listener.local_addr().ok(), "start listening");
        self.serve(listener).await
    }

    /// Serve connections from `listener` until stopped
    ///
    /// The registry is frozen from here on. Accept errors are logged and the
    /// loop keeps going after a short pause; connections already accepted
    /// finish their exchange after a stop.
    pub async fn serve<L: TransportListener>(self, mut listener: L) -> Result<()> {
        let Server { registry, shutdown } = self;
        let registry = Arc::new(registry);
        tracing::info!(
            services = ?registry.service_names().collect::<Vec<_>>(),
            "serving"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    tracing::info!("stop accept loop");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(connection) => spawn_connection(registry.clone(), connection),
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        tokio::select! {
                            () = shutdown.cancelled() => {}
                            () = tokio::time::sleep(ACCEPT_RETRY_DELAY) => {}
                        }
                    }
                }
            }
        }

        listener.close().await
    }
}

/// Stops a running [`Server`]
#[derive(Debug, Clone)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }
}

enum Reply {
    Response(Response),
    Pong(u64),
}

fn spawn_connection<R, W>(registry: Arc<Registry>, connection: Connection<R, W>)
where
    R: AsyncRead + Send + Unpin + 'static,
    W: AsyncWrite + Send + Unpin + 'static,
{
    let Connection {
        reader,
        writer,
        peer,
    } = connection;
    tracing::debug!(%peer, "accepted connection");

    let (tx, rx) = oneshot::channel();
    tokio::spawn(read_and_dispatch(registry, reader, tx, peer.clone()));
    tokio::spawn(send_reply(writer, rx, peer));
}

async fn read_and_dispatch<R>(
    registry: Arc<Registry>,
    mut reader: FrameReader<R>,
    reply: oneshot::Sender<Reply>,
    peer: String,
) where
    R: AsyncRead + Send + Unpin,
{
    let outcome = match reader.read_header().await {
        Ok((header, frame_len)) => match reader.read_body(header, frame_len).await {
            Ok(frame) => handle_frame(registry, frame).await,
            Err(e) => {
                tracing::warn!(%peer, request_id = header.request_id, error = %e, "failed to read frame body");
                Reply::Response(Response::failure(
                    header.request_id,
                    header.compression,
                    header.serializer,
                    e.to_string(),
                ))
            }
        },
        Err(Error::ConnectionClosed) => {
            tracing::debug!(%peer, "peer closed without sending a frame");
            return;
        }
        Err(e) => {
            tracing::warn!(%peer, error = %e, "failed to read frame header");
            Reply::Response(Response::failure(
                0,
                CompressionKind::default(),
                SerializerKind::default(),
                e.to_string(),
            ))
        }
    };

    if reply.send(outcome).is_err() {
        tracing::debug!(%peer, "writer task gone before the reply was ready");
    }
}

async fn handle_frame(registry: Arc<Registry>, frame: Frame) -> Reply {
    let header = frame.header;
    match header.kind {
        MessageKind::Ping => Reply::Pong(header.request_id),
        MessageKind::Request => match frame.decode_request() {
            Ok(request) => Reply::Response(
                dispatch(registry, request, header.compression, header.serializer).await,
            ),
            Err(e) => {
                tracing::warn!(request_id = header.request_id, error = %e, "failed to decode request");
                Reply::Response(Response::failure(
                    header.request_id,
                    header.compression,
                    header.serializer,
                    e.to_string(),
                ))
            }
        },
        other => Reply::Response(Response::failure(
            header.request_id,
            header.compression,
            header.serializer,
            format!("unexpected message kind {:?}", other),
        )),
    }
}

async fn dispatch(
    registry: Arc<Registry>,
    request: Request,
    compression: CompressionKind,
    serializer: SerializerKind,
) -> Response {
    let Request {
        request_id,
        service,
        method,
        args,
    } = request;
    tracing::debug!(request_id, %service, %method, args = args.len(), "dispatching");

    // Handlers are synchronous; keep them off the reactor threads
    let outcome = {
        let (service, method) = (service.clone(), method.clone());
        tokio::task::spawn_blocking(move || registry.dispatch(&service, &method, args)).await
    };

    let error = match outcome {
        Ok(Ok(value)) => return Response::success(request_id, compression, serializer, value),
        Ok(Err(e)) => e,
        Err(join) if join.is_panic() => DispatchError::Panicked(panic_message(join.into_panic())),
        Err(join) => DispatchError::Handler(format!("handler did not complete: {}", join)),
    };

    match &error {
        DispatchError::Panicked(_) => {
            tracing::error!(request_id, %service, %method, error = %error, "handler panicked")
        }
        _ => tracing::debug!(request_id, %service, %method, error = %error, "call failed"),
    }
    Response::failure(request_id, compression, serializer, error.to_string())
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

async fn send_reply<W>(mut writer: FrameWriter<W>, reply: oneshot::Receiver<Reply>, peer: String)
where
    W: AsyncWrite + Send + Unpin,
{
    if let Ok(reply) = reply.await {
        match encode_reply(reply) {
            Ok(frame) => {
                if let Err(e) = writer.write_frame(&frame).await {
                    tracing::warn!(%peer, error = %e, "failed to send reply");
                }
            }
            Err(e) => tracing::error!(%peer, error = %e, "dropping unencodable reply"),
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!(%peer, error = %e, "shutdown after reply");
    }
}

fn encode_reply(reply: Reply) -> Result<Frame> {
    match reply {
        Reply::Pong(request_id) => Ok(Frame::pong(request_id)),
        Reply::Response(response) => Frame::response(&response).or_else(|e| {
            tracing::error!(request_id = response.request_id, error = %e, "failed to encode response");
            Frame::response(&Response::failure(
                response.request_id,
                response.compression,
                response.serializer,
                format!("failed to encode response: {}", e),
            ))
        }),
    }
}
