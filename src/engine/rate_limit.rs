//! Token-bucket admission control for upstream calls
//!
//! One bucket is shared (via `Arc`) by every executor in the process; each
//! upstream call costs one token. The critical section only updates counters;
//! waiting happens outside the lock so concurrent queries never serialize on
//! each other beyond the bucket arithmetic itself.

use super::error::QueryError;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Shared token bucket
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Take one token, or report how long until one is available
    fn take(&mut self, now: Instant) -> Option<Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            None
        } else {
            let deficit = 1.0 - self.tokens;
            Some(Duration::from_secs_f64(deficit / self.refill_per_sec))
        }
    }
}

impl RateLimiter {
    /// Create a bucket starting full
    pub fn new(capacity: f64, refill_per_sec: f64) -> Self {
        assert!(capacity >= 1.0, "bucket must hold at least one token");
        assert!(refill_per_sec > 0.0, "refill rate must be positive");
        Self {
            bucket: Mutex::new(Bucket {
                capacity,
                tokens: capacity,
                refill_per_sec,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Acquire one token, suspending the calling task until one is available
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().expect("rate limiter lock poisoned");
                bucket.take(Instant::now())
            };
            match wait {
                None => return,
                Some(delay) => tokio::time::sleep(delay).await,
            }
        }
    }

    /// Acquire one token without waiting
    pub fn try_acquire(&self) -> Result<(), QueryError> {
        let mut bucket = self.bucket.lock().expect("rate limiter lock poisoned");
        match bucket.take(Instant::now()) {
            None => Ok(()),
            Some(_) => Err(QueryError::RateLimitExceeded),
        }
    }
}
