//! Fixed-window rate limiting for the login-link endpoint.
//!
//! The counter store is injected so the in-memory map can be swapped for a
//! shared store (e.g. Redis) without touching request-handling code.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Counter storage. `hit` records one request for `key` in the window
/// beginning at `window_start` and returns the count so far in that window.
pub trait RateLimitStore: Send + Sync {
    fn hit(&self, key: &str, window_start: u64) -> u32;
}

/// Process-local store. Counters are kept for the live window only: when a
/// hit arrives for a new window every previous counter is stale and the map
/// is cleared, so memory is bounded by the distinct keys seen in the current
/// window even when keys (emails) are attacker-chosen.
#[derive(Default)]
pub struct MemoryStore {
    window: Mutex<CountWindow>,
}

#[derive(Default)]
struct CountWindow {
    start: u64,
    counts: HashMap<String, u32>,
}

impl RateLimitStore for MemoryStore {
    fn hit(&self, key: &str, window_start: u64) -> u32 {
        let mut window = self.window.lock().expect("rate limit store poisoned");
        if window.start != window_start {
            window.start = window_start;
            window.counts.clear();
        }
        let count = window.counts.entry(key.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

pub struct RateLimiter {
    store: Box<dyn RateLimitStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Box<dyn RateLimitStore>, max_requests: u32, window: Duration) -> Self {
        Self {
            store,
            max_requests,
            window: window.max(Duration::from_secs(1)),
        }
    }

    /// Record a request and report whether it is within the limit.
    pub fn check(&self, key: &str) -> bool {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.check_at(key, now)
    }

    /// Clock-injected variant of [`check`](Self::check).
    pub fn check_at(&self, key: &str, now_secs: u64) -> bool {
        let window_secs = self.window.as_secs();
        let window_start = now_secs - now_secs % window_secs;
        self.store.hit(key, window_start) <= self.max_requests
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(
            Box::new(MemoryStore::default()),
            max,
            Duration::from_secs(window_secs),
        )
    }

    #[test]
    fn test_allows_up_to_max_then_blocks() {
        let limiter = limiter(3, 60);
        assert!(limiter.check_at("ada@example.com", 1000));
        assert!(limiter.check_at("ada@example.com", 1001));
        assert!(limiter.check_at("ada@example.com", 1002));
        assert!(!limiter.check_at("ada@example.com", 1003));
    }

    #[test]
    fn test_window_rollover_resets_count() {
        let limiter = limiter(1, 60);
        assert!(limiter.check_at("ada@example.com", 59));
        assert!(!limiter.check_at("ada@example.com", 59));
        // Next fixed window starts at t=60.
        assert!(limiter.check_at("ada@example.com", 60));
    }

    #[test]
    fn test_rollover_evicts_stale_keys() {
        // Keys come from an unauthenticated form field, so the store must
        // not grow across windows no matter how many distinct keys show up.
        let store = MemoryStore::default();
        for i in 0..1000 {
            store.hit(&format!("bot{i}@example.com"), 0);
        }
        assert_eq!(store.window.lock().unwrap().counts.len(), 1000);

        store.hit("ada@example.com", 60);
        let window = store.window.lock().unwrap();
        assert_eq!(window.start, 60);
        assert_eq!(window.counts.len(), 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = limiter(1, 60);
        assert!(limiter.check_at("ada@example.com", 100));
        assert!(limiter.check_at("grace@example.com", 100));
        assert!(!limiter.check_at("ada@example.com", 101));
    }
}
