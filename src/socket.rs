//! The rootsocket connection engine.
//!
//! One `RootSocket` owns at most one transport at a time and multiplexes any
//! number of channel subscriptions over it. It fetches and decodes the
//! connection token, wires the transport lifecycle hooks to itself, runs the
//! application-level heartbeat, dispatches inbound frames, and gates every
//! outbound action on the permissions carried by the token.

use crate::claims::{decode_connection_token, Claims};
use crate::error::{Result, RootSocketError};
use crate::event_handlers::EventHandlers;
use crate::message::{Incoming, Message, Payload};
use crate::registry::{ChannelHandler, Registry, Removal};
use crate::timeouts::RootSocketTimeouts;
use crate::token::{
    http_token_callback, unconfigured_token_callback, TokenCallback, TokenRequestOptions,
};
use crate::transport::{
    websocket_factory, Transport, TransportFactory, TransportHooks, TransportState,
};
use futures_util::future::BoxFuture;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::task::JoinHandle;

/// Default server when none is configured.
const DEFAULT_SERVER: &str = "rootsocket.com";

/// Async predicate consulted after a close to decide whether the client
/// should try to connect again.
pub type ReconnectCallback = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Millis since the Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// State owned exclusively by the engine, mutated only under its lock.
struct EngineState {
    transport: Option<Box<dyn Transport>>,
    claims: Option<Claims>,
    registry: Registry,
    last_pong_ms: Option<u64>,
    heartbeat: Option<JoinHandle<()>>,
}

struct Inner {
    server: String,
    disable_tls: bool,
    timeouts: RootSocketTimeouts,
    transport_factory: TransportFactory,
    on_connection_token: TokenCallback,
    on_channel_token: TokenCallback,
    on_reconnect: ReconnectCallback,
    event_handlers: EventHandlers,
    state: Mutex<EngineState>,
}

/// Client handle for the rootsocket channel service.
///
/// Cheap to clone; all clones share the same connection and subscription
/// state.
///
/// # Examples
///
/// ```rust,no_run
/// use rootsocket::RootSocket;
/// use std::sync::Arc;
///
/// # async fn example() -> rootsocket::Result<()> {
/// let socket = RootSocket::builder()
///     .server("rootsocket.example.com")
///     .connection_url("https://api.example.com/rootsocket/connection/")
///     .channel_url("https://api.example.com/rootsocket/channel/")
///     .build()?;
///
/// socket.connect().await?;
/// while socket.is_connecting() {
///     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
/// }
///
/// let sub = socket
///     .subscribe("chat", Arc::new(|raw| println!("chat: {}", raw)))
///     .await?;
/// socket.send("chat", "hello");
/// sub.unsubscribe()?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RootSocket {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RootSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootSocket").finish_non_exhaustive()
    }
}

impl RootSocket {
    /// Start configuring a client.
    pub fn builder() -> RootSocketBuilder {
        RootSocketBuilder::new()
    }

    /// Open a connection, tearing down any existing one first.
    ///
    /// Fetches a connection token, decodes its claims (a failed decode
    /// leaves the connection without claims, so every later permission
    /// check denies), and hands the connection URL to the transport
    /// factory. Returns as soon as the transport is constructed; the
    /// handshake completes in the background. Poll [`is_connected`]
    /// (RootSocket::is_connected) to wait for it.
    pub async fn connect(&self) -> Result<()> {
        self.disconnect();

        let token = (self.inner.on_connection_token)().await?;
        let claims = decode_connection_token(&token);
        if claims.is_none() {
            log::warn!("connection token claims did not decode, permission checks will deny");
        }

        let url = self.connection_url(&token);
        let transport = (self.inner.transport_factory)(url, self.inner.wire_hooks());

        let mut state = self.inner.locked();
        state.claims = claims;
        state.last_pong_ms = None;
        state.transport = Some(transport);
        Ok(())
    }

    /// Close the current connection, if any.
    pub fn disconnect(&self) {
        let state = self.inner.locked();
        if let Some(transport) = state.transport.as_ref() {
            transport.close();
        }
    }

    /// Whether the transport is open for traffic.
    pub fn is_connected(&self) -> bool {
        self.transport_state() == Some(TransportState::Open)
    }

    /// Whether the transport handshake is still in progress.
    pub fn is_connecting(&self) -> bool {
        self.transport_state() == Some(TransportState::Connecting)
    }

    /// Whether the connection is neither open nor being opened.
    pub fn is_closed(&self) -> bool {
        !self.is_connected() && !self.is_connecting()
    }

    /// Subscribe `handler` to `channel`.
    ///
    /// The first handler for a channel emits one `subscription-add` frame;
    /// further handlers only join the local list. When the connection token
    /// carries `allowChannelAuthorization`, the channel-token provider is
    /// awaited before the membership check, so a repeat subscribe to an
    /// already-tracked channel still performs the fetch even though no
    /// frame goes out.
    ///
    /// # Errors
    ///
    /// [`RootSocketError::NotConnected`] when the transport is not open,
    /// [`RootSocketError::NotAllowedChannelSubscription`] when the claims
    /// deny subscriptions, and any error from the channel-token provider.
    pub async fn subscribe(&self, channel: &str, handler: ChannelHandler) -> Result<Subscription> {
        if !self.is_connected() {
            return Err(RootSocketError::NotConnected);
        }

        let (allow_subscription, needs_auth) = {
            let state = self.inner.locked();
            state.claims.as_ref().map_or((false, false), |c| {
                (c.allow_channel_subscription, c.allow_channel_authorization)
            })
        };
        if !allow_subscription {
            return Err(RootSocketError::NotAllowedChannelSubscription);
        }

        let auth = if needs_auth {
            Some((self.inner.on_channel_token)().await?)
        } else {
            None
        };

        let mut state = self.inner.locked();
        if state.registry.add(channel, handler.clone()) {
            self.inner
                .send_wire(&state, &Message::subscription_add(channel, auth));
        }
        drop(state);

        Ok(Subscription {
            socket: self.clone(),
            channel: channel.to_string(),
            handler,
        })
    }

    /// Remove one handler from `channel`, by reference identity.
    ///
    /// Removing the channel's only handler drops the entry and emits one
    /// `subscription-remove` frame; otherwise the removal is local.
    pub fn unsubscribe(&self, channel: &str, handler: &ChannelHandler) -> Result<()> {
        if !self.is_connected() {
            return Err(RootSocketError::NotConnected);
        }
        let mut state = self.inner.locked();
        if state.registry.remove(channel, handler) == Removal::ChannelRemoved {
            self.inner
                .send_wire(&state, &Message::subscription_remove(channel));
        }
        Ok(())
    }

    /// Drop every handler for `channel` and emit one `subscription-remove`
    /// frame, whether or not the channel was tracked.
    pub fn unsubscribe_all(&self, channel: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(RootSocketError::NotConnected);
        }
        let mut state = self.inner.locked();
        self.inner
            .send_wire(&state, &Message::subscription_remove(channel));
        let _ = state.registry.remove_channel(channel);
        Ok(())
    }

    /// Channel names currently tracked, in subscription order.
    pub fn get_subscriptions(&self) -> Vec<String> {
        self.inner.locked().registry.names()
    }

    /// Publish `payload` on `channel`.
    ///
    /// Never fails: a missing `allowClientSend` permission or a missing
    /// local subscription is logged and dropped. Strings go out verbatim;
    /// JSON values are encoded first.
    pub fn send(&self, channel: &str, payload: impl Into<Payload>) {
        let state = self.inner.locked();
        if !state.claims.as_ref().is_some_and(|c| c.allow_client_send) {
            log::debug!("{}", RootSocketError::NotAllowedSend);
            return;
        }
        if !state.registry.contains(channel) {
            log::debug!("{} (channel {})", RootSocketError::NotSubscribed, channel);
            return;
        }
        let message = Message::channel_data(channel, payload.into().into_raw());
        self.inner.send_wire(&state, &message);
    }

    fn transport_state(&self) -> Option<TransportState> {
        self.inner
            .locked()
            .transport
            .as_ref()
            .map(|t| t.ready_state())
    }

    fn connection_url(&self, token: &str) -> String {
        let scheme = if self.inner.disable_tls { "ws" } else { "wss" };
        format!("{}://{}/api/v1/ws/{}/", scheme, self.inner.server, token)
    }
}

impl Inner {
    fn locked(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build the hook set a new transport reports into. Hooks hold a weak
    /// reference so a dropped client does not stay alive through its
    /// transport's driver task.
    fn wire_hooks(self: &Arc<Self>) -> TransportHooks {
        let open = Arc::downgrade(self);
        let close = Arc::downgrade(self);
        let error = Arc::downgrade(self);
        let message = Arc::downgrade(self);
        TransportHooks::new()
            .on_open(move || {
                if let Some(inner) = open.upgrade() {
                    Inner::handle_open(&inner);
                }
            })
            .on_close(move || {
                if let Some(inner) = close.upgrade() {
                    Inner::handle_close(&inner);
                }
            })
            .on_error(move |detail| {
                if let Some(inner) = error.upgrade() {
                    inner.handle_error(detail);
                }
            })
            .on_message(move |text| {
                if let Some(inner) = message.upgrade() {
                    inner.handle_message(text);
                }
            })
    }

    fn handle_open(self: &Arc<Self>) {
        log::debug!("connection open");
        self.event_handlers.emit_connect();

        let weak = Arc::downgrade(self);
        let interval = self.timeouts.heartbeat_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // the zeroth tick completes immediately
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else { return };
                inner.heartbeat_tick();
            }
        });

        let mut state = self.locked();
        if let Some(old) = state.heartbeat.replace(handle) {
            old.abort();
        }
    }

    fn handle_close(self: &Arc<Self>) {
        log::debug!("connection closed");
        self.event_handlers.emit_disconnect();

        let mut state = self.locked();
        if let Some(heartbeat) = state.heartbeat.take() {
            heartbeat.abort();
        }
        drop(state);

        // The predicate is consulted but no retry loop is wired to it; it
        // is the extension point for one.
        let predicate = self.on_reconnect.clone();
        let _ = tokio::spawn(async move {
            let again = predicate().await;
            log::debug!("reconnect predicate returned {}", again);
        });
    }

    fn handle_error(&self, detail: &str) {
        log::warn!("transport error: {}", detail);
        self.event_handlers.emit_error(detail);
    }

    /// Dispatch one inbound frame, control tags first.
    fn handle_message(&self, raw: &str) {
        self.event_handlers.emit_receive(raw);
        let message = match Message::from_wire(raw) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("{}", e);
                return;
            }
        };

        match message.classify() {
            Incoming::Pong => {
                self.locked().last_pong_ms = Some(now_ms());
            }
            Incoming::Ping => {
                let state = self.locked();
                self.send_wire(&state, &Message::pong());
            }
            Incoming::Error(m) => {
                let detail = m
                    .data
                    .as_ref()
                    .and_then(|d| d.detail.clone())
                    .unwrap_or_default();
                log::warn!("server error: {}", detail);
                if m.is_subscription_error() {
                    self.handle_subscription_error(&m);
                }
            }
            Incoming::Data(m) => self.dispatch_data(&m),
        }
    }

    /// Invoke every handler registered for the frame's channel, in
    /// registration order, outside the state lock. A handler that panics is
    /// not caught here; handler correctness belongs to the caller.
    fn dispatch_data(&self, message: &Message) {
        let handlers = self.locked().registry.snapshot(&message.event);
        if handlers.is_empty() {
            log::debug!(
                "{} (channel {})",
                RootSocketError::ChannelNoHandler,
                message.event
            );
            return;
        }
        let raw = message
            .data
            .as_ref()
            .and_then(|d| d.raw.clone())
            .unwrap_or_default();
        for handler in handlers {
            handler(&raw);
        }
    }

    /// Clean up after the server refused a subscription.
    ///
    /// More than one local handler means an add frame went out; mirror it
    /// with a remove. An entry with one or zero handlers was never
    /// subscribed server-side, so no remove is owed.
    fn handle_subscription_error(&self, message: &Message) {
        let Some(channel) = message.data.as_ref().and_then(|d| d.location.clone()) else {
            return;
        };
        let mut state = self.locked();
        if state.registry.handler_count(&channel) > 1 {
            self.send_wire(&state, &Message::subscription_remove(&channel));
        }
        let _ = state.registry.remove_channel(&channel);
    }

    /// One heartbeat tick: check the pong window, then send a ping.
    ///
    /// The comparison tears the connection down while the last pong is
    /// still *inside* the timeout window; a connection that has never seen
    /// a pong is left alone.
    fn heartbeat_tick(&self) {
        let state = self.locked();
        if self.pong_is_fresh(&state) {
            if let Some(transport) = state.transport.as_ref() {
                transport.close();
            }
        }
        self.send_wire(&state, &Message::ping());
    }

    fn pong_is_fresh(&self, state: &EngineState) -> bool {
        state.last_pong_ms.is_some_and(|last| {
            now_ms().saturating_sub(last) < self.timeouts.pong_timeout.as_millis() as u64
        })
    }

    /// Serialize and hand a frame to the transport, if there is one.
    fn send_wire(&self, state: &EngineState, message: &Message) {
        let Some(transport) = state.transport.as_ref() else {
            log::debug!("dropping outbound '{}' frame, no transport", message.event);
            return;
        };
        match message.to_wire() {
            Ok(text) => {
                self.event_handlers.emit_send(&text);
                transport.send(&text);
            }
            Err(e) => log::warn!("{}", e),
        }
    }
}

/// Handle returned by [`RootSocket::subscribe`]; undoes that subscription.
///
/// Unsubscribing is explicit. Dropping the handle leaves the subscription
/// in place.
pub struct Subscription {
    socket: RootSocket,
    channel: String,
    handler: ChannelHandler,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}

impl Subscription {
    /// The channel this handle belongs to.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Remove the handler this handle was created with.
    pub fn unsubscribe(self) -> Result<()> {
        self.socket.unsubscribe(&self.channel, &self.handler)
    }
}

/// Builder for [`RootSocket`].
///
/// Either `connection_url` or an explicit connection-token callback is
/// required; everything else has a default.
pub struct RootSocketBuilder {
    server: String,
    connection_url: Option<String>,
    channel_url: Option<String>,
    disable_tls: bool,
    request_options: TokenRequestOptions,
    http_client: Option<reqwest::Client>,
    connection_token: Option<TokenCallback>,
    channel_token: Option<TokenCallback>,
    transport_factory: Option<TransportFactory>,
    on_reconnect: Option<ReconnectCallback>,
    event_handlers: EventHandlers,
    timeouts: RootSocketTimeouts,
}

impl Default for RootSocketBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RootSocketBuilder {
    pub fn new() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            connection_url: None,
            channel_url: None,
            disable_tls: false,
            request_options: TokenRequestOptions::default(),
            http_client: None,
            connection_token: None,
            channel_token: None,
            transport_factory: None,
            on_reconnect: None,
            event_handlers: EventHandlers::default(),
            timeouts: RootSocketTimeouts::default(),
        }
    }

    /// Host the WebSocket endpoint lives on.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// HTTP endpoint that issues connection tokens.
    pub fn connection_url(mut self, url: impl Into<String>) -> Self {
        self.connection_url = Some(url.into());
        self
    }

    /// HTTP endpoint that issues per-channel authorization tokens.
    pub fn channel_url(mut self, url: impl Into<String>) -> Self {
        self.channel_url = Some(url.into());
        self
    }

    /// Connect with `ws://` instead of `wss://`.
    pub fn disable_tls(mut self, disable: bool) -> Self {
        self.disable_tls = disable;
        self
    }

    /// Extra request configuration for the token endpoints.
    pub fn token_request_options(mut self, options: TokenRequestOptions) -> Self {
        self.request_options = options;
        self
    }

    /// HTTP client used for token requests. A fresh one is built otherwise.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Replace the connection-token provider entirely.
    pub fn connection_token_callback(mut self, callback: TokenCallback) -> Self {
        self.connection_token = Some(callback);
        self
    }

    /// Replace the channel-token provider entirely.
    pub fn channel_token_callback(mut self, callback: TokenCallback) -> Self {
        self.channel_token = Some(callback);
        self
    }

    /// Replace the transport implementation. Defaults to the stock
    /// `tokio-tungstenite` factory.
    pub fn transport_factory(mut self, factory: TransportFactory) -> Self {
        self.transport_factory = Some(factory);
        self
    }

    /// Predicate consulted after a close. Defaults to always `true`.
    pub fn on_reconnect(mut self, callback: ReconnectCallback) -> Self {
        self.on_reconnect = Some(callback);
        self
    }

    /// Observer callbacks for lifecycle events and raw traffic.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Heartbeat timing.
    pub fn timeouts(mut self, timeouts: RootSocketTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// [`RootSocketError::Configuration`] when no connection-token source
    /// was provided.
    pub fn build(self) -> Result<RootSocket> {
        let http_client = self.http_client.unwrap_or_default();

        let on_connection_token = match (self.connection_token, self.connection_url) {
            (Some(callback), _) => callback,
            (None, Some(url)) => {
                http_token_callback(url, http_client.clone(), self.request_options.clone())
            }
            (None, None) => {
                return Err(RootSocketError::Configuration(
                    "a connection_url or connection token callback is required".to_string(),
                ));
            }
        };

        let on_channel_token = match (self.channel_token, self.channel_url) {
            (Some(callback), _) => callback,
            (None, Some(url)) => http_token_callback(url, http_client, self.request_options),
            (None, None) => unconfigured_token_callback("channel token"),
        };

        Ok(RootSocket {
            inner: Arc::new(Inner {
                server: self.server,
                disable_tls: self.disable_tls,
                timeouts: self.timeouts,
                transport_factory: self.transport_factory.unwrap_or_else(websocket_factory),
                on_connection_token,
                on_channel_token,
                on_reconnect: self.on_reconnect.unwrap_or_else(|| {
                    Arc::new(|| -> BoxFuture<'static, bool> { Box::pin(async { true }) })
                }),
                event_handlers: self.event_handlers,
                state: Mutex::new(EngineState {
                    transport: None,
                    claims: None,
                    registry: Registry::new(),
                    last_pong_ms: None,
                    heartbeat: None,
                }),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_requires_a_connection_token_source() {
        let err = RootSocket::builder().build().unwrap_err();
        assert!(matches!(err, RootSocketError::Configuration(_)));
    }

    fn static_token(token: &'static str) -> TokenCallback {
        Arc::new(move || -> BoxFuture<'static, Result<String>> {
            Box::pin(async move { Ok(token.to_string()) })
        })
    }

    #[test]
    fn builder_accepts_a_callback_instead_of_a_url() {
        let callback = static_token("tok");
        let socket = RootSocket::builder()
            .connection_token_callback(callback)
            .build()
            .unwrap();
        assert!(socket.is_closed());
        assert!(socket.get_subscriptions().is_empty());
    }

    #[test]
    fn connection_url_scheme_follows_tls_flag() {
        let secure = RootSocket::builder()
            .server("example.test")
            .connection_token_callback(static_token("tok"))
            .build()
            .unwrap();
        assert_eq!(
            secure.connection_url("abc"),
            "wss://example.test/api/v1/ws/abc/"
        );

        let plain = RootSocket::builder()
            .server("example.test")
            .disable_tls(true)
            .connection_token_callback(static_token("tok"))
            .build()
            .unwrap();
        assert_eq!(
            plain.connection_url("abc"),
            "ws://example.test/api/v1/ws/abc/"
        );
    }
}
