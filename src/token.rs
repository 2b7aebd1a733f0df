//! Async token-provider callbacks.
//!
//! The client never mints tokens itself. It is handed two zero-argument
//! async callbacks: one that resolves the connection token used to open the
//! transport, and one that resolves a per-channel authorization token. The
//! stock implementation POSTs to an HTTP endpoint and reads the `token`
//! field out of the JSON response; anything else (a cache, a test stub) can
//! be injected through the same callback type.

use crate::error::{Result, RootSocketError};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use std::sync::Arc;

/// A zero-argument async callback resolving to a token string.
pub type TokenCallback = Arc<dyn Fn() -> BoxFuture<'static, Result<String>> + Send + Sync>;

/// Extra request configuration for the HTTP token endpoints.
#[derive(Debug, Clone, Default)]
pub struct TokenRequestOptions {
    /// Headers attached to every token request, e.g. a session cookie or an
    /// API key the token service requires.
    pub headers: Vec<(String, String)>,
}

impl TokenRequestOptions {
    /// Empty options: a bare POST with no extra headers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a header to every token request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Build a [`TokenCallback`] that POSTs to `url` and returns the `token`
/// field of the JSON response body.
///
/// Used for both the connection and the channel endpoint; the two only
/// differ by URL.
pub fn http_token_callback(
    url: impl Into<String>,
    client: reqwest::Client,
    options: TokenRequestOptions,
) -> TokenCallback {
    let url = url.into();
    Arc::new(move || -> BoxFuture<'static, Result<String>> {
        let client = client.clone();
        let url = url.clone();
        let options = options.clone();
        Box::pin(async move {
            let mut request = client.post(&url);
            for (name, value) in &options.headers {
                request = request.header(name.as_str(), value.as_str());
            }
            let response = request
                .send()
                .await
                .map_err(|e| RootSocketError::TokenRequest(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(RootSocketError::TokenRequest(format!(
                    "{} returned {}",
                    url, status
                )));
            }
            let body: TokenResponse = response
                .json()
                .await
                .map_err(|e| RootSocketError::TokenRequest(e.to_string()))?;
            Ok(body.token)
        })
    })
}

/// A [`TokenCallback`] that always fails with a configuration hint.
///
/// Installed as the channel-token provider when no channel endpoint was
/// configured, so the failure surfaces at the first subscribe that actually
/// needs channel authorization rather than at build time.
pub(crate) fn unconfigured_token_callback(what: &'static str) -> TokenCallback {
    Arc::new(move || -> BoxFuture<'static, Result<String>> {
        Box::pin(async move {
            Err(RootSocketError::TokenRequest(format!(
                "no {} endpoint configured",
                what
            )))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unconfigured_callback_fails_with_hint() {
        let cb = unconfigured_token_callback("channel token");
        let err = cb().await.unwrap_err();
        assert!(err.to_string().contains("channel token"));
    }

    #[test]
    fn options_accumulate_headers() {
        let options = TokenRequestOptions::new()
            .header("x-api-key", "k1")
            .header("cookie", "session=abc");
        assert_eq!(options.headers.len(), 2);
        assert_eq!(options.headers[0].0, "x-api-key");
    }
}
