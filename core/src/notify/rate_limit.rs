use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

/// Allows at most one occurrence per key within `window`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    window: Duration,
    last_allowed: HashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        RateLimiter {
            window,
            last_allowed: HashMap::new(),
        }
    }

    /// Returns whether `key` may fire at `now`, recording it if so.
    pub fn check(&mut self, key: &str, now: Instant) -> bool {
        match self.last_allowed.get(key) {
            Some(last) if now.saturating_duration_since(*last) < self.window => false,
            _ => {
                self.last_allowed.insert(key.to_owned(), now);
                true
            }
        }
    }

    pub fn reset_prefix(&mut self, prefix: &str) {
        self.last_allowed.retain(|key, _| !key.starts_with(prefix));
    }
}
