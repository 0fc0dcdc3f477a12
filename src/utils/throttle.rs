//! Log throttling
//!
//! Configuration writes can arrive long before the media engine exists, and
//! each of them would log the same "not ready" warning. `LogThrottler` lets
//! one message per key through per interval.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Limits how often a message with the same key is logged
pub struct LogThrottler {
    last_logged: Mutex<HashMap<&'static str, Instant>>,
    interval: Duration,
}

impl LogThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            last_logged: Mutex::new(HashMap::new()),
            interval,
        }
    }

    pub fn with_secs(secs: u64) -> Self {
        Self::new(Duration::from_secs(secs))
    }

    /// Returns `true` (and restarts the interval) if `key` may be logged now
    pub fn should_log(&self, key: &'static str) -> bool {
        let now = Instant::now();
        let mut map = self.last_logged.lock();
        if let Some(last) = map.get(key) {
            if now.duration_since(*last) < self.interval {
                return false;
            }
        }
        map.insert(key, now);
        true
    }

    /// Forget `key`, so its next occurrence is logged immediately
    pub fn clear(&self, key: &'static str) {
        self.last_logged.lock().remove(key);
    }
}

impl Default for LogThrottler {
    fn default() -> Self {
        Self::with_secs(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_within_interval() {
        let throttler = LogThrottler::with_secs(60);
        assert!(throttler.should_log("engine"));
        assert!(!throttler.should_log("engine"));
        assert!(throttler.should_log("session"));
    }

    #[test]
    fn test_clear_resets_key() {
        let throttler = LogThrottler::with_secs(60);
        assert!(throttler.should_log("engine"));
        throttler.clear("engine");
        assert!(throttler.should_log("engine"));
    }

    #[test]
    fn test_zero_interval_never_throttles() {
        let throttler = LogThrottler::new(Duration::ZERO);
        assert!(throttler.should_log("engine"));
        assert!(throttler.should_log("engine"));
    }
}
