//! Sliding window rate limiting per client.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::http::request::client_identity;
use crate::http::response::ApiError;
use crate::observability::metrics;

const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Outcome of a single rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

/// Per-client request log over a sliding window.
///
/// Each client keeps the instants of its accepted requests that are still
/// inside the window, so the count is exact at every moment.
pub struct RateLimiter {
    hits: DashMap<String, VecDeque<Instant>>,
    window: Duration,
    max_requests: u32,
    trusted_hops: usize,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, trusted_hops: usize) -> Self {
        Self {
            hits: DashMap::new(),
            window: config.window(),
            max_requests: config.max_requests,
            trusted_hops,
        }
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// Record a request from `key` at `now`.
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        let mut log = self.hits.entry(key.to_string()).or_default();
        prune(&mut log, now, self.window);

        if (log.len() as u32) < self.max_requests {
            log.push_back(now);
            Decision::Allowed {
                remaining: self.max_requests - log.len() as u32,
            }
        } else {
            let oldest = log.front().copied().unwrap_or(now);
            Decision::Limited {
                retry_after: (oldest + self.window).saturating_duration_since(now),
            }
        }
    }

    /// Drop expired entries and clients with no requests left in the window.
    pub fn sweep(&self, now: Instant) {
        let window = self.window;
        self.hits.retain(|_, log| {
            prune(log, now, window);
            !log.is_empty()
        });
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.hits.len()
    }
}

fn prune(log: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&first) = log.front() {
        if now.saturating_duration_since(first) >= window {
            log.pop_front();
        } else {
            break;
        }
    }
}

/// Pipeline stage: reject clients over budget with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let key = client_identity(&request, limiter.trusted_hops);

    match limiter.check(&key) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(limiter.max_requests));
            headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
            Ok(response)
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(client = %key, retry_after_secs = retry_after.as_secs(), "Rate limit exceeded");
            metrics::record_rate_limited();
            Err(ApiError::TooManyRequests { retry_after })
        }
    }
}
