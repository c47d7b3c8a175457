//! Rate-limited logging for rejected wire input.
//!
//! A peer that sends a stream of malformed messages must not be able to flood the log,
//! so decoders report through a `RateLimiter` that allows a burst of messages per
//! window and then counts what it drops.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Rate limit for log output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Messages allowed per window.
    pub max_messages: u32,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Five messages per minute.
    pub const DEFAULT: RateLimitConfig = RateLimitConfig::new(5, Duration::from_secs(60));

    pub const fn new(max_messages: u32, window: Duration) -> Self {
        Self {
            max_messages,
            window,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug)]
struct Window {
    start: Option<Instant>,
    allowed: u32,
    dropped: u32,
}

/// Fixed-window limiter, usable from a `static`.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub const fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            window: Mutex::new(Window {
                start: None,
                allowed: 0,
                dropped: 0,
            }),
        }
    }

    /// Checks whether a message may be logged now.
    ///
    /// Returns `None` if the message should be dropped. Otherwise returns the number of
    /// messages dropped since the last one that was let through.
    pub fn check(&self) -> Option<u32> {
        self.check_at(Instant::now())
    }

    fn check_at(&self, now: Instant) -> Option<u32> {
        let mut w = self.window.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match w.start {
            Some(start) => now.saturating_duration_since(start) >= self.config.window,
            None => true,
        };
        if expired {
            w.start = Some(now);
            w.allowed = 0;
        }
        if w.allowed < self.config.max_messages {
            w.allowed += 1;
            let dropped = w.dropped;
            w.dropped = 0;
            Some(dropped)
        } else {
            w.dropped = w.dropped.saturating_add(1);
            None
        }
    }
}

/// Log a `tracing::warn!` event through a `RateLimiter`.
#[macro_export]
macro_rules! warn_rl {
    ($rl:expr, $($arg:tt)+) => {
        if let Some(dropped) = $rl.check() {
            if dropped > 0 {
                tracing::warn!(dropped, "log messages suppressed by rate limit");
            }
            tracing::warn!($($arg)+);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_burst_then_drops() {
        let rl = RateLimiter::new(RateLimitConfig::new(2, Duration::from_secs(60)));
        let t0 = Instant::now();
        assert_eq!(rl.check_at(t0), Some(0));
        assert_eq!(rl.check_at(t0), Some(0));
        assert_eq!(rl.check_at(t0), None);
        assert_eq!(rl.check_at(t0 + Duration::from_secs(1)), None);
    }

    #[test]
    fn new_window_reports_dropped() {
        let rl = RateLimiter::new(RateLimitConfig::new(1, Duration::from_secs(10)));
        let t0 = Instant::now();
        assert_eq!(rl.check_at(t0), Some(0));
        assert_eq!(rl.check_at(t0), None);
        assert_eq!(rl.check_at(t0), None);
        assert_eq!(rl.check_at(t0 + Duration::from_secs(10)), Some(2));
        assert_eq!(rl.check_at(t0 + Duration::from_secs(11)), None);
    }

    #[test]
    fn default_config() {
        let c = RateLimitConfig::default();
        assert_eq!(c.max_messages, 5);
        assert_eq!(c.window, Duration::from_secs(60));
    }

    #[test]
    fn macro_expands() {
        static RL: RateLimiter = RateLimiter::new(RateLimitConfig::DEFAULT);
        warn_rl!(RL, "bad thing {}", 1);
    }
}
