//! Channel subscription registry.
//!
//! Maps channel names to the handlers interested in them, preserving both
//! channel insertion order and handler registration order. A channel is
//! present exactly while the connection believes it is subscribed on the
//! wire; the engine translates the absent→present and present→absent
//! transitions into subscribe / unsubscribe messages.

use std::sync::Arc;

/// Handler invoked with the `raw` payload of each data message.
pub type ChannelHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Outcome of removing one handler from a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// The channel held a single handler; the whole entry is gone and an
    /// unsubscribe message is owed.
    ChannelRemoved,
    /// One handler was dropped, others remain; no wire effect.
    HandlerRemoved,
    /// The channel was not tracked at all.
    NotSubscribed,
}

struct ChannelEntry {
    channel: String,
    handlers: Vec<ChannelHandler>,
}

/// Insertion-ordered channel → handlers map. Small enough that linear
/// lookup beats a hash map plus a separate order list.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<ChannelEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.entries.iter().any(|e| e.channel == channel)
    }

    pub fn handler_count(&self, channel: &str) -> usize {
        self.entries
            .iter()
            .find(|e| e.channel == channel)
            .map_or(0, |e| e.handlers.len())
    }

    /// Clones of the handlers for `channel`, in registration order, so they
    /// can be invoked without holding the registry lock.
    pub fn snapshot(&self, channel: &str) -> Vec<ChannelHandler> {
        self.entries
            .iter()
            .find(|e| e.channel == channel)
            .map(|e| e.handlers.clone())
            .unwrap_or_default()
    }

    /// Append a handler. Returns `true` when this created the channel entry,
    /// i.e. a subscribe message is owed.
    pub fn add(&mut self, channel: &str, handler: ChannelHandler) -> bool {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.channel == channel) {
            entry.handlers.push(handler);
            false
        } else {
            self.entries.push(ChannelEntry {
                channel: channel.to_string(),
                handlers: vec![handler],
            });
            true
        }
    }

    /// Remove one handler by reference identity.
    ///
    /// A channel holding exactly one handler is removed whole, regardless of
    /// whether that handler is the one passed in; otherwise only matching
    /// handlers are dropped.
    pub fn remove(&mut self, channel: &str, handler: &ChannelHandler) -> Removal {
        let Some(index) = self.entries.iter().position(|e| e.channel == channel) else {
            return Removal::NotSubscribed;
        };
        if self.entries[index].handlers.len() == 1 {
            let _ = self.entries.remove(index);
            Removal::ChannelRemoved
        } else {
            self.entries[index]
                .handlers
                .retain(|h| !Arc::ptr_eq(h, handler));
            Removal::HandlerRemoved
        }
    }

    /// Drop a channel and all its handlers. Returns `true` if it existed.
    pub fn remove_channel(&mut self, channel: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.channel != channel);
        self.entries.len() != before
    }

    /// Channel names in insertion order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.channel.clone()).collect()
    }
}
