//! Per-adapter token bucket rate limiting (spec §5 shared-resource policy).
//!
//! Each adapter instance owns its own bucket; nothing here is shared
//! across workflow instances or processes (explicitly out of scope per
//! spec §9).

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// A simple token bucket: refills continuously at `rate_per_second`, caps
/// at `burst`, and blocks the caller until a token is available.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    rate_per_second: f64,
    burst: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(rate_per_second: f64, burst: f64) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            rate_per_second,
            burst,
        }
    }

    /// FDA regulatory endpoints default to at least 1 request/second
    /// (spec §5).
    pub fn fda_default() -> Self {
        Self::new(1.0, 1.0)
    }

    /// Waits until a token is available, then consumes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.last_refill).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate_per_second).min(self.burst);
                state.last_refill = now;

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    Some(Duration::from_secs_f64(deficit / self.rate_per_second))
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn burst_capacity_allows_immediate_acquires_up_to_cap() {
        let bucket = TokenBucket::new(1.0, 3.0);
        let start = Instant::now();
        bucket.acquire().await;
        bucket.acquire().await;
        bucket.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn exceeding_burst_forces_a_wait() {
        let bucket = Arc::new(TokenBucket::new(10.0, 1.0));
        bucket.acquire().await;
        let start = Instant::now();
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(80));
    }
}
