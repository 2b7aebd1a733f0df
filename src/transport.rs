//! Transport abstraction and the stock WebSocket implementation.
//!
//! The engine never talks to a socket directly. It is given a
//! [`TransportFactory`] that, for a URL and a set of lifecycle hooks,
//! produces a [`Transport`] handle. The stock factory drives a
//! `tokio-tungstenite` stream from a background task; tests inject their own
//! factory and fire the hooks by hand.

use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message as WsMessage};

/// Readiness of a transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Handshake in progress.
    Connecting,
    /// Open for traffic.
    Open,
    /// Close initiated but not yet complete.
    Closing,
    /// Closed; the handle is dead.
    Closed,
}

/// A bidirectional text-message transport.
///
/// Implementations must be cheap to call from any task: `send` and `close`
/// are fire-and-forget, delivery failures are reported through the `on_error`
/// / `on_close` hooks rather than return values.
pub trait Transport: Send + Sync {
    /// Queue a text frame for delivery.
    fn send(&self, text: &str);

    /// Current readiness of the underlying connection.
    fn ready_state(&self) -> TransportState;

    /// Initiate a close. Idempotent.
    ///
    /// May be called while the engine holds internal locks that the
    /// lifecycle hooks also take, so implementations must not fire
    /// `on_close` synchronously from here; report the close from a driver
    /// task once it completes.
    fn close(&self);
}

/// Callback type for the open and close hooks.
pub type TransportEventCallback = Arc<dyn Fn() + Send + Sync>;
/// Callback type for the error hook.
pub type TransportErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Callback type for the inbound-message hook.
pub type TransportMessageCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Lifecycle hooks a transport fires as the connection progresses.
///
/// All hooks are optional; the engine wires the ones it needs before handing
/// the set to the factory.
#[derive(Clone, Default)]
pub struct TransportHooks {
    pub(crate) on_open: Option<TransportEventCallback>,
    pub(crate) on_close: Option<TransportEventCallback>,
    pub(crate) on_error: Option<TransportErrorCallback>,
    pub(crate) on_message: Option<TransportMessageCallback>,
}

impl TransportHooks {
    /// Empty hook set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hook fired once the connection is open for traffic.
    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    /// Hook fired when the connection has closed, for any reason.
    pub fn on_close(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    /// Hook fired on a transport-level failure.
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Hook fired for every inbound text frame.
    pub fn on_message(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Fire the open hook. For transport implementations.
    pub fn emit_open(&self) {
        if let Some(cb) = &self.on_open {
            cb();
        }
    }

    /// Fire the close hook. For transport implementations.
    ///
    /// Must not be called while the caller holds locks a hook callback may
    /// also take; real transports fire it from their own driver task.
    pub fn emit_close(&self) {
        if let Some(cb) = &self.on_close {
            cb();
        }
    }

    /// Fire the error hook. For transport implementations.
    pub fn emit_error(&self, detail: &str) {
        if let Some(cb) = &self.on_error {
            cb(detail);
        }
    }

    /// Fire the inbound-message hook. For transport implementations.
    pub fn emit_message(&self, text: &str) {
        if let Some(cb) = &self.on_message {
            cb(text);
        }
    }
}

/// Constructor for transports: URL plus hooks in, live handle out.
pub type TransportFactory =
    Arc<dyn Fn(String, TransportHooks) -> Box<dyn Transport> + Send + Sync>;

/// The stock `tokio-tungstenite` factory.
pub fn websocket_factory() -> TransportFactory {
    Arc::new(|url, hooks| Box::new(WsTransport::spawn(url, hooks)))
}

const STATE_CONNECTING: u8 = 0;
const STATE_OPEN: u8 = 1;
const STATE_CLOSING: u8 = 2;
const STATE_CLOSED: u8 = 3;

enum WsCommand {
    Send(String),
    Close,
}

/// Stock transport: a background task owns the WebSocket stream; the handle
/// talks to it over an unbounded command channel.
pub struct WsTransport {
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    state: Arc<AtomicU8>,
    _task: JoinHandle<()>,
}

impl WsTransport {
    /// Connect to `url` and start the driver task. Returns immediately; the
    /// handshake outcome is reported through the hooks.
    pub fn spawn(url: String, hooks: TransportHooks) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let state = Arc::new(AtomicU8::new(STATE_CONNECTING));
        let task = tokio::spawn(driver(url, hooks, cmd_rx, state.clone()));
        Self { cmd_tx, state, _task: task }
    }
}

impl Transport for WsTransport {
    fn send(&self, text: &str) {
        if self.cmd_tx.send(WsCommand::Send(text.to_string())).is_err() {
            log::debug!("transport send after driver exit, dropping frame");
        }
    }

    fn ready_state(&self) -> TransportState {
        match self.state.load(Ordering::SeqCst) {
            STATE_CONNECTING => TransportState::Connecting,
            STATE_OPEN => TransportState::Open,
            STATE_CLOSING => TransportState::Closing,
            _ => TransportState::Closed,
        }
    }

    fn close(&self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

/// Own the stream: connect, pump frames and commands, fire hooks.
async fn driver(
    url: String,
    hooks: TransportHooks,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    state: Arc<AtomicU8>,
) {
    let mut ws = match connect_async(&url).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            log::warn!("websocket handshake failed: {}", e);
            state.store(STATE_CLOSED, Ordering::SeqCst);
            hooks.emit_error(&e.to_string());
            hooks.emit_close();
            return;
        }
    };

    state.store(STATE_OPEN, Ordering::SeqCst);
    hooks.emit_open();

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(WsCommand::Send(text)) => {
                    if let Err(e) = ws.send(WsMessage::Text(text.into())).await {
                        log::warn!("websocket send failed: {}", e);
                        state.store(STATE_CLOSED, Ordering::SeqCst);
                        hooks.emit_error(&e.to_string());
                        hooks.emit_close();
                        return;
                    }
                }
                Some(WsCommand::Close) | None => {
                    state.store(STATE_CLOSING, Ordering::SeqCst);
                    let _ = ws.close(None).await;
                    state.store(STATE_CLOSED, Ordering::SeqCst);
                    hooks.emit_close();
                    return;
                }
            },
            frame = ws.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => hooks.emit_message(text.as_str()),
                Some(Ok(WsMessage::Ping(payload))) => {
                    let _ = ws.send(WsMessage::Pong(payload)).await;
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    state.store(STATE_CLOSED, Ordering::SeqCst);
                    hooks.emit_close();
                    return;
                }
                Some(Ok(_)) => {} // Binary / Pong / raw frames carry nothing for us
                Some(Err(e)) => {
                    log::warn!("websocket read failed: {}", e);
                    state.store(STATE_CLOSED, Ordering::SeqCst);
                    hooks.emit_error(&e.to_string());
                    hooks.emit_close();
                    return;
                }
            }
        }
    }
}
