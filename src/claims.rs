//! Connection-token claims decoding.
//!
//! The server hands out a three-segment JWT whose payload carries the
//! permissions for the connection. The client only *reads* the payload; it
//! never verifies the signature — the token is trusted because it came out
//! of a just-completed authenticated token exchange.

use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;

/// Permissions embedded in a connection token.
///
/// Decoded once per successful `connect()` and held for the lifetime of that
/// connection attempt. Missing fields decode as `false` / `0`, so a token
/// that omits a permission denies it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Claims {
    /// May this connection publish data to channels it is subscribed to?
    #[serde(default, rename = "allowClientSend")]
    pub allow_client_send: bool,

    /// May this connection subscribe to channels at all?
    #[serde(default, rename = "allowChannelSubscription")]
    pub allow_channel_subscription: bool,

    /// Does each subscription additionally require a per-channel auth token?
    #[serde(default, rename = "allowChannelAuthorization")]
    pub allow_channel_authorization: bool,

    /// Expiry as seconds since the Unix epoch. Advisory; the client does not
    /// act on it.
    #[serde(default)]
    pub exp: u64,
}

/// Decode the claims payload of a connection token.
///
/// Returns `None` for anything malformed: wrong segment count, invalid
/// padding length, non-base64 characters, or a payload that is not a JSON
/// object. Callers treat `None` as "no claims" — every permission check then
/// fails closed.
pub fn decode_connection_token(token: &str) -> Option<Claims> {
    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return None;
    }
    decode_payload(segments[1])
}

/// Decode one URL-safe base64 segment into a [`Claims`] value.
fn decode_payload(segment: &str) -> Option<Claims> {
    let mut normalized = segment.replace('-', "+").replace('_', "/");
    match normalized.len() % 4 {
        0 => {}
        2 => normalized.push_str("=="),
        3 => normalized.push('='),
        _ => return None,
    }
    let bytes = general_purpose::STANDARD.decode(normalized.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn token_with_payload(payload: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload);
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn decodes_well_formed_token() {
        let token = token_with_payload(
            r#"{"allowClientSend":true,"allowChannelSubscription":true,"allowChannelAuthorization":false,"exp":1924992000}"#,
        );
        let claims = decode_connection_token(&token).expect("claims should decode");
        assert!(claims.allow_client_send);
        assert!(claims.allow_channel_subscription);
        assert!(!claims.allow_channel_authorization);
        assert_eq!(claims.exp, 1924992000);
    }

    #[test]
    fn missing_fields_deny() {
        let token = token_with_payload(r#"{"allowChannelSubscription":true}"#);
        let claims = decode_connection_token(&token).unwrap();
        assert!(!claims.allow_client_send);
        assert!(claims.allow_channel_subscription);
        assert!(!claims.allow_channel_authorization);
        assert_eq!(claims.exp, 0);
    }

    #[test]
    fn padding_lengths_are_covered() {
        // Payload lengths chosen so the encoded segment needs 0, 1 and 2
        // padding characters respectively.
        for payload in [
            r#"{"allowClientSend":true}"#,
            r#"{"allowClientSend":false}"#,
            r#"{"allowClientSend":true,"exp":9}"#,
        ] {
            let token = token_with_payload(payload);
            assert!(
                decode_connection_token(&token).is_some(),
                "failed for payload {payload}"
            );
        }
    }

    #[test]
    fn url_safe_characters_are_normalized() {
        // '~' and '?' encode to base64 output containing '-' / '_' in the
        // URL-safe alphabet.
        let token = token_with_payload(r#"{"allowClientSend":true,"exp":63,"x":"~?~?~"}"#);
        let claims = decode_connection_token(&token).unwrap();
        assert!(claims.allow_client_send);
    }

    #[test]
    fn malformed_tokens_yield_none() {
        for bad in ["", "bad", "0", "a.b", "a.b.c.d", "only.two", "..", "a.!!!.c"] {
            assert!(decode_connection_token(bad).is_none(), "accepted {bad:?}");
        }
    }

    #[test]
    fn invalid_padding_length_yields_none() {
        // A segment whose length is ≡ 1 (mod 4) can never be valid base64.
        let token = format!("h.{}.s", "A".repeat(5));
        assert!(decode_connection_token(&token).is_none());
    }

    #[test]
    fn non_object_payload_yields_none() {
        let token = token_with_payload("[1,2,3]");
        assert!(decode_connection_token(&token).is_none());
    }
}
