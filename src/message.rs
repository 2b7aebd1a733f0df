//! Wire protocol for the rootsocket channel service.
//!
//! Every frame exchanged over the transport is a small JSON document with an
//! `event` tag and an optional `data` record. The reserved tags (`ping`,
//! `pong`, `error`, `subscription-add`, `subscription-remove`) form the
//! control plane; any other tag is a channel name carrying data.

use crate::error::{Result, RootSocketError};
use serde::{Deserialize, Serialize};

/// Reserved event tag for keepalive pings.
pub const PING: &str = "ping";
/// Reserved event tag for keepalive pongs.
pub const PONG: &str = "pong";
/// Reserved event tag for subscribe requests.
pub const SUBSCRIPTION_ADD: &str = "subscription-add";
/// Reserved event tag for unsubscribe requests.
pub const SUBSCRIPTION_REMOVE: &str = "subscription-remove";
/// Reserved event tag for server-side errors.
pub const ERROR: &str = "error";
/// Marker substring identifying a subscription error in `data.detail`.
pub const SUBSCRIPTION_ERROR_DETAIL: &str = "cannot subscribe";

/// Payload record attached to most messages. Which fields are present
/// depends on the event kind.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Data {
    /// Human-readable error detail (error messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Channel an error relates to (error messages).
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Channel being subscribed or unsubscribed (subscription messages).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Verbatim payload of a channel data message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,

    /// Connection identifier, set by the server on some errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,

    /// Per-channel authorization token (subscribe requests).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
}

/// One wire frame: an event tag plus its optional payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// A reserved control tag, or a channel name for data messages.
    pub event: String,

    /// Event payload. Absent for `ping` / `pong`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Data>,
}

/// An inbound frame after classification.
///
/// Classification checks the reserved control tags before falling back to
/// channel data, so a channel named like a control tag is always read as the
/// control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Server asked for a liveness reply.
    Ping,
    /// Server answered one of our pings.
    Pong,
    /// Server-side error report.
    Error(Message),
    /// Data for the channel named by `event`.
    Data(Message),
}

impl Message {
    /// Build a keepalive ping.
    pub fn ping() -> Self {
        Self { event: PING.to_string(), data: None }
    }

    /// Build a keepalive pong.
    pub fn pong() -> Self {
        Self { event: PONG.to_string(), data: None }
    }

    /// Build a subscribe request, optionally carrying a channel auth token.
    pub fn subscription_add(channel: &str, auth: Option<String>) -> Self {
        Self {
            event: SUBSCRIPTION_ADD.to_string(),
            data: Some(Data {
                channel: Some(channel.to_string()),
                auth,
                ..Data::default()
            }),
        }
    }

    /// Build an unsubscribe request.
    pub fn subscription_remove(channel: &str) -> Self {
        Self {
            event: SUBSCRIPTION_REMOVE.to_string(),
            data: Some(Data {
                channel: Some(channel.to_string()),
                ..Data::default()
            }),
        }
    }

    /// Build a channel data message with a verbatim payload.
    pub fn channel_data(channel: &str, raw: String) -> Self {
        Self {
            event: channel.to_string(),
            data: Some(Data { raw: Some(raw), ..Data::default() }),
        }
    }

    /// Whether this frame is a keepalive ping.
    pub fn is_ping(&self) -> bool {
        self.event == PING
    }

    /// Whether this frame is a keepalive pong.
    pub fn is_pong(&self) -> bool {
        self.event == PONG
    }

    /// Whether this frame is a server error.
    pub fn is_error(&self) -> bool {
        self.event == ERROR
    }

    /// Whether this frame is an error caused by a failed subscription.
    pub fn is_subscription_error(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.detail.as_ref())
            .is_some_and(|detail| detail.contains(SUBSCRIPTION_ERROR_DETAIL))
    }

    /// Classify an inbound frame. Control tags win over channel names, in
    /// the fixed order ping, pong, error, data.
    pub fn classify(self) -> Incoming {
        if self.is_ping() {
            Incoming::Ping
        } else if self.is_pong() {
            Incoming::Pong
        } else if self.is_error() {
            Incoming::Error(self)
        } else {
            Incoming::Data(self)
        }
    }

    /// Serialize for the wire.
    pub fn to_wire(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| RootSocketError::MalformedMessage(e.to_string()))
    }

    /// Parse a frame received from the wire.
    pub fn from_wire(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| RootSocketError::MalformedMessage(e.to_string()))
    }
}

/// Outbound payload accepted by [`RootSocket::send`](crate::RootSocket::send).
///
/// Strings go out verbatim; anything JSON-shaped is encoded to its compact
/// string form first.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Sent as-is in the `raw` field.
    Raw(String),
    /// Encoded with `serde_json` before sending.
    Json(serde_json::Value),
}

impl Payload {
    /// The string that ends up in the `raw` field on the wire.
    pub(crate) fn into_raw(self) -> String {
        match self {
            Payload::Raw(s) => s,
            Payload::Json(v) => v.to_string(),
        }
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Raw(value)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Raw(value.to_string())
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Json(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_and_pong_have_no_data() {
        assert_eq!(Message::ping().to_wire().unwrap(), r#"{"event":"ping"}"#);
        assert_eq!(Message::pong().to_wire().unwrap(), r#"{"event":"pong"}"#);
    }

    #[test]
    fn subscription_add_wire_shape() {
        let msg = Message::subscription_add("news", Some("tok".to_string()));
        assert_eq!(
            msg.to_wire().unwrap(),
            r#"{"event":"subscription-add","data":{"channel":"news","auth":"tok"}}"#
        );

        let bare = Message::subscription_add("news", None);
        assert_eq!(
            bare.to_wire().unwrap(),
            r#"{"event":"subscription-add","data":{"channel":"news"}}"#
        );
    }

    #[test]
    fn subscription_remove_wire_shape() {
        let msg = Message::subscription_remove("news");
        assert_eq!(
            msg.to_wire().unwrap(),
            r#"{"event":"subscription-remove","data":{"channel":"news"}}"#
        );
    }

    #[test]
    fn channel_data_round_trip() {
        let msg = Message::channel_data("chat", "hello".to_string());
        let parsed = Message::from_wire(&msg.to_wire().unwrap()).unwrap();
        assert_eq!(parsed, msg);
        assert_eq!(parsed.data.unwrap().raw.as_deref(), Some("hello"));
    }

    #[test]
    fn error_where_field_parses() {
        let parsed = Message::from_wire(
            r#"{"event":"error","data":{"detail":"cannot subscribe","where":"chat"}}"#,
        )
        .unwrap();
        assert!(parsed.is_error());
        assert!(parsed.is_subscription_error());
        assert_eq!(parsed.data.unwrap().location.as_deref(), Some("chat"));
    }

    #[test]
    fn subscription_error_requires_marker() {
        let parsed = Message::from_wire(
            r#"{"event":"error","data":{"detail":"rate limited","where":"chat"}}"#,
        )
        .unwrap();
        assert!(parsed.is_error());
        assert!(!parsed.is_subscription_error());
    }

    #[test]
    fn classification_is_exclusive_and_ordered() {
        assert_eq!(Message::ping().classify(), Incoming::Ping);
        assert_eq!(Message::pong().classify(), Incoming::Pong);

        let err = Message::from_wire(r#"{"event":"error","data":{"detail":"x"}}"#).unwrap();
        assert!(matches!(err.classify(), Incoming::Error(_)));

        let data = Message::channel_data("anything", "x".to_string());
        assert!(matches!(data.classify(), Incoming::Data(_)));

        // A data frame whose channel shadows a control tag is read as control.
        let shadowed = Message::from_wire(r#"{"event":"ping","data":{"raw":"x"}}"#).unwrap();
        assert_eq!(shadowed.classify(), Incoming::Ping);
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(Message::from_wire("not json").is_err());
        assert!(Message::from_wire(r#"{"data":{}}"#).is_err());
    }

    #[test]
    fn payload_conversion() {
        assert_eq!(Payload::from("hi").into_raw(), "hi");
        assert_eq!(
            Payload::from(serde_json::json!({"a": 1})).into_raw(),
            r#"{"a":1}"#
        );
    }
}
