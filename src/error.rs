//! Error types for the rootsocket client library.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RootSocketError>;

/// Errors surfaced by the rootsocket client.
///
/// The first five variants are the fixed caller-facing conditions; the
/// remaining ones carry detail from the layer that produced them.
#[derive(Debug, Error)]
pub enum RootSocketError {
    /// The transport is not open. Raised by `subscribe` / `unsubscribe`.
    #[error("not connected, did you forget to call connect?")]
    NotConnected,

    /// The connection token does not grant channel subscriptions.
    #[error("not allowed to subscribe, login with your account and change it")]
    NotAllowedChannelSubscription,

    /// The connection token does not grant publishing. Logged, never raised.
    #[error("not allowed to send, login with your account and change it")]
    NotAllowedSend,

    /// A data message arrived for a channel nobody handles. Logged, never raised.
    #[error("received message for channel but there are no handlers")]
    ChannelNoHandler,

    /// A send was attempted on a channel with no local subscription.
    /// Logged, never raised.
    #[error("not subscribed, subscribe to the channel before sending")]
    NotSubscribed,

    /// A token endpoint request failed or returned an unusable body.
    #[error("token request failed: {0}")]
    TokenRequest(String),

    /// The client was built with an invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The underlying transport reported a failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// A wire message could not be serialized or parsed.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}
