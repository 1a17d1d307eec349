//! Token-bucket rate limiting for Slack Web API methods.
//!
//! Slack publishes per-method limits in tiers (requests per minute). A
//! `RateLimiter` is built per method family and shared by clones.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Slack Web API rate-limit tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlackTier {
    /// ~20 requests per minute (`conversations.info`, `users.info`)
    Tier2,
    /// ~50 requests per minute (`conversations.history`, `conversations.replies`)
    Tier3,
    /// ~100 requests per minute (`chat.getPermalink`)
    Tier4,
    /// `chat.postMessage`: about one message per second per channel
    Special,
}

/// Bucket sizing.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests refilled per `window`.
    pub max_requests: u32,
    pub window: Duration,
    /// Extra tokens above `max_requests` the bucket can hold.
    pub burst_capacity: u32,
}

impl RateLimitConfig {
    /// Bucket for a Slack tier.
    pub fn for_tier(tier: SlackTier) -> Self {
        let minute = Duration::from_secs(60);
        match tier {
            SlackTier::Tier2 => Self { max_requests: 20, window: minute, burst_capacity: 0 },
            SlackTier::Tier3 => Self { max_requests: 50, window: minute, burst_capacity: 0 },
            SlackTier::Tier4 => Self { max_requests: 100, window: minute, burst_capacity: 0 },
            SlackTier::Special => Self {
                max_requests: 1,
                window: Duration::from_secs(1),
                burst_capacity: 3,
            },
        }
    }

    /// A bucket that never blocks in practice. Used by tests.
    pub fn unlimited() -> Self {
        Self {
            max_requests: 10_000,
            window: Duration::from_secs(1),
            burst_capacity: 10_000,
        }
    }

    fn capacity(&self) -> f64 {
        f64::from(self.max_requests + self.burst_capacity)
    }

    fn refill_per_sec(&self) -> f64 {
        f64::from(self.max_requests) / self.window.as_secs_f64()
    }
}

/// Token bucket shared between clones.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    bucket: Arc<Mutex<Bucket>>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let tokens = config.capacity();
        Self {
            config,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens,
                refilled_at: Instant::now(),
            })),
        }
    }

    /// Limiter for a Slack tier.
    pub fn for_tier(tier: SlackTier) -> Self {
        Self::new(RateLimitConfig::for_tier(tier))
    }

    /// Take a token if one is available, else report how long to wait.
    pub async fn try_acquire(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().await;

        let now = Instant::now();
        let elapsed = now.duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.config.refill_per_sec())
            .min(self.config.capacity());
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let missing = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(missing / self.config.refill_per_sec()))
        }
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        while let Err(wait) = self.try_acquire().await {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "Slack rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_allows_capacity_then_blocks() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 3,
            window: Duration::from_secs(60),
            burst_capacity: 2,
        });

        for _ in 0..5 {
            assert!(limiter.try_acquire().await.is_ok());
        }
        let wait = limiter.try_acquire().await.unwrap_err();
        assert!(wait > Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_clones_share_bucket() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window: Duration::from_secs(60),
            burst_capacity: 0,
        });
        let other = limiter.clone();

        assert!(limiter.try_acquire().await.is_ok());
        assert!(other.try_acquire().await.is_err());
    }

    #[test]
    fn test_tier_sizes() {
        assert_eq!(RateLimitConfig::for_tier(SlackTier::Tier3).max_requests, 50);
        assert_eq!(RateLimitConfig::for_tier(SlackTier::Special).burst_capacity, 3);
    }
}
