//! Connection lifecycle event handlers.
//!
//! Optional callback hooks for observing the client from the outside:
//!
//! - [`on_connect`](EventHandlers::on_connect): transport opened
//! - [`on_disconnect`](EventHandlers::on_disconnect): transport closed
//! - [`on_error`](EventHandlers::on_error): transport-level error
//! - [`on_receive`](EventHandlers::on_receive): every raw inbound frame
//! - [`on_send`](EventHandlers::on_send): every raw outbound frame
//!
//! None of them are required for correct operation; the engine works the
//! same with an empty set.
//!
//! # Example
//!
//! ```rust
//! use rootsocket::EventHandlers;
//!
//! let handlers = EventHandlers::new()
//!     .on_connect(|| println!("connected"))
//!     .on_disconnect(|| println!("disconnected"))
//!     .on_receive(|frame| println!("<- {}", frame));
//! ```

use std::fmt;
use std::sync::Arc;

/// Callback for the connect and disconnect hooks.
pub type OnLifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback for the error hook; receives a human-readable detail string.
pub type OnErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Callback for the raw frame taps.
pub type OnFrameCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional observer callbacks for the connection lifecycle and raw traffic.
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_connect: Option<OnLifecycleCallback>,
    pub(crate) on_disconnect: Option<OnLifecycleCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_receive: Option<OnFrameCallback>,
    pub(crate) on_send: Option<OnFrameCallback>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_send", &self.on_send.is_some())
            .finish()
    }
}

impl EventHandlers {
    /// Empty set, no callbacks registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the transport reports open.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called when the transport closes, for any reason.
    pub fn on_disconnect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Called on a transport-level error with a detail string.
    pub fn on_error(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Called with every raw inbound frame before parsing. Diagnostic tap.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Called with every raw outbound frame. Diagnostic tap.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    pub(crate) fn emit_disconnect(&self) {
        if let Some(cb) = &self.on_disconnect {
            cb();
        }
    }

    pub(crate) fn emit_error(&self, detail: &str) {
        if let Some(cb) = &self.on_error {
            cb(detail);
        }
    }

    pub(crate) fn emit_receive(&self, frame: &str) {
        if let Some(cb) = &self.on_receive {
            cb(frame);
        }
    }

    pub(crate) fn emit_send(&self, frame: &str) {
        if let Some(cb) = &self.on_send {
            cb(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn empty_set_emits_nothing() {
        let handlers = EventHandlers::new();
        handlers.emit_connect();
        handlers.emit_disconnect();
        handlers.emit_error("x");
        handlers.emit_receive("x");
        handlers.emit_send("x");
    }

    #[test]
    fn registered_hooks_fire() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let handlers = EventHandlers::new().on_connect(move || {
            let _ = h.fetch_add(1, Ordering::SeqCst);
        });
        handlers.emit_connect();
        handlers.emit_connect();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }
}
