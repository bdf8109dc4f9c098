//! Per-host token-bucket rate limiting
//!
//! Every normalized host gets its own bucket, created lazily on first use
//! and shared by all workers. Buckets are never evicted; the key space is
//! bounded by the site whitelist in practice.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Async token bucket
///
/// Holds up to `burst` tokens and refills at `rate` tokens per second.
/// `acquire` waits until a token is available rather than rejecting.
pub struct TokenBucket {
    rate: f64,
    burst: f64,
    state: tokio::sync::Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate: u32, burst: u32) -> Self {
        let burst = (burst.max(1)) as f64;
        Self {
            rate: (rate.max(1)) as f64,
            burst,
            state: tokio::sync::Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token, sleeping until the bucket refills if necessary
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                // time until one full token accrues
                Duration::from_secs_f64((1.0 - state.tokens) / self.rate)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Takes one token without waiting; false when the bucket is empty
    pub fn try_acquire(&self) -> bool {
        let mut state = match self.state.try_lock() {
            Ok(state) => state,
            Err(_) => return false,
        };
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate).min(self.burst);
        state.last_refill = now;
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Registry of per-host token buckets
pub struct HostLimiters {
    default_rate: u32,
    default_burst: u32,
    buckets: Mutex<HashMap<String, Arc<TokenBucket>>>,
}

impl HostLimiters {
    pub fn new(default_rate: u32, default_burst: u32) -> Self {
        Self {
            default_rate,
            default_burst,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Gets or creates the bucket for a normalized host
    ///
    /// Returns None for an empty host, which callers treat as "no limit".
    pub fn limiter_for(&self, host: &str) -> Option<Arc<TokenBucket>> {
        if host.is_empty() {
            return None;
        }
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(TokenBucket::new(self.default_rate, self.default_burst)))
            .clone();
        Some(bucket)
    }

    /// Number of hosts with a live bucket
    pub fn len(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
