//! Common utilities for Slack API access.
//!
//! Slack rate limits Web API methods by tier; every outgoing call goes
//! through a token bucket sized for its tier.

pub mod rate_limit;

pub use rate_limit::{RateLimiter, RateLimitConfig, SlackTier};
