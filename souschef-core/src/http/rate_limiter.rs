//! Per-host rate limiting for page fetches.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tokio::time::sleep;

/// Spaces out requests to the same host by at least `min_delay`.
pub struct RateLimiter {
    min_delay: Duration,
    last_request: DashMap<String, Instant>,
}

impl RateLimiter {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: DashMap::new(),
        }
    }

    /// Sleep until `host` may be contacted again, then record the request.
    pub async fn wait(&self, host: &str) {
        if self.min_delay.is_zero() {
            return;
        }

        // Copy the instant out so the map guard is not held across the sleep
        let last = self.last_request.get(host).map(|entry| *entry);
        if let Some(last) = last {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                sleep(self.min_delay - elapsed).await;
            }
        }

        self.last_request.insert(host.to_string(), Instant::now());
    }

    pub fn tracked_hosts(&self) -> usize {
        self.last_request.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}
