//! Rust client for the RootSocket real-time channel service.
//!
//! Opens one WebSocket connection per client, authenticates it with a
//! short-lived token fetched from an HTTP endpoint, and multiplexes any
//! number of channel subscriptions over it. Permissions come from the
//! claims embedded in the connection token; an application-level
//! ping/pong heartbeat watches for silently dead connections.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use rootsocket::RootSocket;
//! use std::sync::Arc;
//!
//! # async fn example() -> rootsocket::Result<()> {
//! let socket = RootSocket::builder()
//!     .server("rootsocket.example.com")
//!     .connection_url("https://api.example.com/rootsocket/connection/")
//!     .channel_url("https://api.example.com/rootsocket/channel/")
//!     .build()?;
//!
//! socket.connect().await?;
//! while socket.is_connecting() {
//!     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//! }
//!
//! let subscription = socket
//!     .subscribe("chat", Arc::new(|raw| println!("chat: {}", raw)))
//!     .await?;
//!
//! socket.send("chat", "hello");
//! socket.send("chat", serde_json::json!({ "text": "typed hello" }));
//!
//! subscription.unsubscribe()?;
//! socket.disconnect();
//! # Ok(())
//! # }
//! ```
//!
//! # Extension points
//!
//! Token retrieval, the transport, the reconnect decision and the
//! lifecycle observers are all injectable:
//!
//! - [`TokenCallback`] / [`http_token_callback`] — how tokens are fetched.
//! - [`TransportFactory`] / [`Transport`] — what carries the frames.
//! - [`RootSocketBuilder::on_reconnect`] — whether to reconnect after a
//!   close (consulted, not yet acted on).
//! - [`EventHandlers`] — observer taps for lifecycle events and raw frames.

mod claims;
mod error;
mod event_handlers;
mod message;
mod registry;
mod socket;
mod timeouts;
mod token;
mod transport;

pub use claims::{decode_connection_token, Claims};
pub use error::{Result, RootSocketError};
pub use event_handlers::{EventHandlers, OnErrorCallback, OnFrameCallback, OnLifecycleCallback};
pub use message::{
    Data, Incoming, Message, Payload, ERROR, PING, PONG, SUBSCRIPTION_ADD,
    SUBSCRIPTION_ERROR_DETAIL, SUBSCRIPTION_REMOVE,
};
pub use registry::ChannelHandler;
pub use socket::{ReconnectCallback, RootSocket, RootSocketBuilder, Subscription};
pub use timeouts::RootSocketTimeouts;
pub use token::{http_token_callback, TokenCallback, TokenRequestOptions};
pub use transport::{
    websocket_factory, Transport, TransportEventCallback, TransportErrorCallback,
    TransportFactory, TransportHooks, TransportMessageCallback, TransportState, WsTransport,
};
