//! Courier Fabric - point-to-point RPC over header-framed streams
//!
//! Provides the 17-byte frame codec, pluggable serializers (bincode,
//! protobuf) and compression (gzip), TCP and Unix socket transports, a
//! connection-per-request server dispatching to registered services, and a
//! retrying client proxy.
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use courier_fabric::{registry::Service, ClientOptions, ClientProxy, Server};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Server side
//! let mut server = Server::new();
//! server.register(
//!     "echo",
//!     Service::new().method("Upper", |s: String| Ok::<_, Infallible>(s.to_uppercase())),
//! );
//! tokio::spawn(server.run("127.0.0.1:9222"));
//!
//! // Client side, three attempts by default
//! let proxy = ClientProxy::new(&ClientOptions::default());
//! let upper = proxy.call("echo", "Upper", vec!["abc".into()]).await?;
//! assert_eq!(upper.as_str(), Some("ABC"));
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod frame;
pub mod registry;
pub mod request;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use channel::Channel;
pub use client::{Client, ClientOptions, ClientProxy};
pub use courier_core::Value;
pub use envelope::{Request, Response, STATUS_ERROR, STATUS_OK};
pub use error::{DispatchError, Error, Result};
pub use frame::{Frame, Header, MessageKind};
pub use server::{Server, StopHandle};
