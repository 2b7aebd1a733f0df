//! Heartbeat timing configuration.

use std::time::Duration;

/// Timing knobs for the application-level heartbeat.
///
/// # Examples
///
/// ```rust
/// use rootsocket::RootSocketTimeouts;
/// use std::time::Duration;
///
/// // Defaults: ping every minute, three-minute pong window.
/// let timeouts = RootSocketTimeouts::default();
///
/// // Tighter cycle for flaky links.
/// let timeouts = RootSocketTimeouts::default()
///     .heartbeat_interval(Duration::from_secs(15))
///     .pong_timeout(Duration::from_secs(45));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootSocketTimeouts {
    /// Interval between heartbeat ticks. Each tick sends one ping.
    /// Default: 60 seconds.
    pub heartbeat_interval: Duration,

    /// Window against which the age of the last pong is compared on every
    /// tick. Default: 180 seconds.
    pub pong_timeout: Duration,
}

impl Default for RootSocketTimeouts {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(60),
            pong_timeout: Duration::from_secs(3 * 60),
        }
    }
}

impl RootSocketTimeouts {
    /// Override the tick interval.
    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Override the pong window.
    pub fn pong_timeout(mut self, timeout: Duration) -> Self {
        self.pong_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let t = RootSocketTimeouts::default();
        assert_eq!(t.heartbeat_interval, Duration::from_secs(60));
        assert_eq!(t.pong_timeout, Duration::from_secs(180));
    }

    #[test]
    fn builders_override() {
        let t = RootSocketTimeouts::default()
            .heartbeat_interval(Duration::from_millis(10))
            .pong_timeout(Duration::from_millis(30));
        assert_eq!(t.heartbeat_interval, Duration::from_millis(10));
        assert_eq!(t.pong_timeout, Duration::from_millis(30));
    }
}
