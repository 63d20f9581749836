//! Per-client rate limiting.
//!
//! A token bucket per client identity (transport-provided string, usually
//! the peer IP). Tokens refill continuously at `max / window`; each
//! accepted message consumes one token.

use std::time::{Duration, Instant};

use dashmap::DashMap;

struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket rate limiter keyed by client identity.
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    max_tokens: f64,
    window: Duration,
}

impl RateLimiter {
    /// Creates a limiter allowing `max` messages per `window` per client.
    #[must_use]
    pub fn new(max: u64, window: Duration) -> Self {
        Self {
            buckets: DashMap::new(),
            max_tokens: max as f64,
            window,
        }
    }

    /// Tries to consume one token for the given client.
    ///
    /// Returns `true` if the message is allowed, `false` if rate-limited.
    pub fn try_acquire(&self, client: &str) -> bool {
        let mut entry = self
            .buckets
            .entry(client.to_owned())
            .or_insert_with(|| TokenBucket {
                tokens: self.max_tokens,
                last_refill: Instant::now(),
            });

        let bucket = entry.value_mut();
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill);
        let refill = (elapsed.as_secs_f64() / self.window.as_secs_f64()) * self.max_tokens;
        bucket.tokens = (bucket.tokens + refill).min(self.max_tokens);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drops buckets that have fully refilled, bounding memory across many
    /// distinct client identities.
    pub fn prune(&self) {
        self.buckets.retain(|_, bucket| {
            let elapsed = bucket.last_refill.elapsed();
            let refill = (elapsed.as_secs_f64() / self.window.as_secs_f64()) * self.max_tokens;
            bucket.tokens + refill < self.max_tokens
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_in_window() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire("10.0.0.1"));
        assert!(limiter.try_acquire("10.0.0.1"));
        assert!(limiter.try_acquire("10.0.0.1"));
        assert!(!limiter.try_acquire("10.0.0.1"));
    }

    #[test]
    fn clients_have_independent_buckets() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        assert!(limiter.try_acquire("a"));
        assert!(!limiter.try_acquire("a"));
        assert!(limiter.try_acquire("b"));
    }

    #[test]
    fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(10, Duration::from_millis(100));
        for _ in 0..10 {
            assert!(limiter.try_acquire("c"));
        }
        assert!(!limiter.try_acquire("c"));
        std::thread::sleep(Duration::from_millis(50));
        assert!(limiter.try_acquire("c"));
    }

    #[test]
    fn prune_drops_full_buckets() {
        let limiter = RateLimiter::new(2, Duration::from_millis(10));
        assert!(limiter.try_acquire("gone"));
        std::thread::sleep(Duration::from_millis(30));
        limiter.prune();
        assert!(limiter.buckets.is_empty());
    }
}
