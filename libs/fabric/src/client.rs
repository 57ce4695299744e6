use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use courier_core::Value;
use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::codec::{CompressionKind, SerializerKind};
use crate::envelope::{Request, Response};
use crate::error::{Error, Result};
use crate::request;
use crate::transport::{Connector, TcpTransportBuilder};

/// Client configuration
///
/// Every field has a default, so a partial config document is enough:
///
/// ```
/// # use courier_fabric::ClientOptions;
/// let options: ClientOptions =
///     serde_json::from_str(r#"{ "port": 7000, "connect_timeout": "250ms" }"#).unwrap();
/// assert_eq!(options.port, 7000);
/// assert_eq!(options.retries, 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    pub host: String,
    pub port: u16,
    /// Attempts made by [`ClientProxy::call`] before giving up
    pub retries: usize,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Deadline for the response once connected; none by default, so a stalled
    /// server stalls the attempt
    #[serde(with = "humantime_serde")]
    pub receive_timeout: Option<Duration>,
    pub serializer: SerializerKind,
    pub compression: CompressionKind,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9222,
            retries: 3,
            connect_timeout: Duration::from_secs(5),
            receive_timeout: None,
            serializer: SerializerKind::Bincode,
            compression: CompressionKind::Gzip,
        }
    }
}

impl ClientOptions {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// TCP connector honoring the configured timeouts
    pub fn tcp_connector(&self) -> TcpTransportBuilder {
        let builder = TcpTransportBuilder::new()
            .address(self.address())
            .connect_timeout(self.connect_timeout);
        match self.receive_timeout {
            Some(timeout) => builder.receive_timeout(timeout),
            None => builder,
        }
    }
}

/// Client holding at most one open connection
///
/// The server answers a single request per connection, so call
/// [`connect`](Self::connect) before every [`invoke`](Self::invoke).
pub struct Client<C: Connector = TcpTransportBuilder> {
    connector: C,
    compression: CompressionKind,
    serializer: SerializerKind,
    channel: Option<Channel<C::Transport>>,
    next_request_id: u64,
}

impl Client<TcpTransportBuilder> {
    pub fn new(options: &ClientOptions) -> Self {
        Self::with_connector(options.tcp_connector(), options.compression, options.serializer)
    }
}

impl<C: Connector> Client<C> {
    pub fn with_connector(
        connector: C,
        compression: CompressionKind,
        serializer: SerializerKind,
    ) -> Self {
        Self {
            connector,
            compression,
            serializer,
            channel: None,
            next_request_id: 1,
        }
    }

    /// Open a connection, replacing any previous one
    pub async fn connect(&mut self) -> Result<()> {
        let transport = self.connector.connect().await?;
        self.channel = Some(Channel::from_transport(
            transport,
            self.compression,
            self.serializer,
        ));
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_some()
    }

    /// Send one request and wait for its response
    ///
    /// A failure status is returned as a [`Response`]; only transport, framing
    /// and codec problems are errors.
    pub async fn invoke(
        &mut self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<Response> {
        let request_id = self.take_request_id();
        let channel = self.connected()?;
        let request = Request::new(request_id, service, method, args);
        channel.send_request(&request).await?;
        channel.receive_response().await
    }

    /// Check that the server is alive
    pub async fn ping(&mut self) -> Result<()> {
        let request_id = self.take_request_id();
        self.connected()?.ping(request_id).await
    }

    /// Close the connection; a no-op when not connected
    pub async fn close(&mut self) -> Result<()> {
        match self.channel.take() {
            Some(channel) => channel.close().await,
            None => Ok(()),
        }
    }

    fn connected(&mut self) -> Result<&mut Channel<C::Transport>> {
        self.channel
            .as_mut()
            .ok_or_else(|| Error::Transport("not connected".to_string()))
    }

    fn take_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }
}

/// Retrying call proxy
///
/// Every attempt dials a fresh connection, sends the request, waits for the
/// response and hangs up. A failed attempt (connect, write, read, decode, or a
/// non-200 status) is retried immediately, without backoff, until the retry
/// budget is spent.
pub struct ClientProxy<C: Connector = TcpTransportBuilder> {
    connector: C,
    retries: usize,
    compression: CompressionKind,
    serializer: SerializerKind,
    next_request_id: AtomicU64,
}

impl ClientProxy<TcpTransportBuilder> {
    pub fn new(options: &ClientOptions) -> Self {
        Self::with_connector(options.tcp_connector(), options)
    }
}

impl<C: Connector> ClientProxy<C> {
    /// Proxy dialing through `connector`; only the retry budget and codec tags
    /// are taken from `options`
    pub fn with_connector(connector: C, options: &ClientOptions) -> Self {
        Self {
            connector,
            retries: options.retries,
            compression: options.compression,
            serializer: options.serializer,
            next_request_id: AtomicU64::new(1),
        }
    }

    /// Call `service.method(args)` and return its result
    ///
    /// After the last failed attempt the error is
    /// [`Error::RetryExhausted`] wrapping that attempt's error.
    pub async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value> {
        if self.retries == 0 {
            return Err(Error::Config(
                "retry budget must allow at least one attempt".to_string(),
            ));
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(request_id, service, method, args);

        let mut attempt = 1;
        loop {
            let outcome = request::request(
                &self.connector,
                &request,
                self.compression,
                self.serializer,
            )
            .await
            .and_then(Response::into_result);

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= self.retries => {
                    tracing::warn!(request_id, service, method, attempts = attempt, error = %e, "giving up");
                    return Err(Error::RetryExhausted {
                        attempts: attempt,
                        last: Box::new(e),
                    });
                }
                Err(e) => {
                    tracing::debug!(request_id, service, method, attempt, error = %e, "attempt failed, retrying");
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let options = ClientOptions::default();
        assert_eq!(options.address(), "127.0.0.1:9222");
        assert_eq!(options.retries, 3);
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
        assert_eq!(options.receive_timeout, None);
        assert_eq!(options.serializer, SerializerKind::Bincode);
        assert_eq!(options.compression, CompressionKind::Gzip);
    }

    #[test]
    fn partial_config_fills_in_defaults() {
        let options: ClientOptions = serde_json::from_str(
            r#"{
                "host": "10.0.0.5",
                "serializer": "protobuf",
                "receive_timeout": "2s"
            }"#,
        )
        .unwrap();

        assert_eq!(options.address(), "10.0.0.5:9222");
        assert_eq!(options.serializer, SerializerKind::Protobuf);
        assert_eq!(options.receive_timeout, Some(Duration::from_secs(2)));
        assert_eq!(options.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_serializer_is_rejected() {
        let result = serde_json::from_str::<ClientOptions>(r#"{ "serializer": "gob" }"#);
        assert!(result.is_err());
    }
}
