//! Token-bucket rate limiter (§4.B), one instance per external API. Async
//! so callers can simply `.acquire().await` before each outbound request.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::time::{sleep, Duration};

use cortex_ports::Clock;

pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: DateTime<Utc>,
}

impl TokenBucket {
    /// `rate_per_sec` also doubles as the bucket's burst capacity.
    pub fn new(rate_per_sec: f64, clock: &dyn Clock) -> Self {
        Self {
            capacity: rate_per_sec,
            refill_per_sec: rate_per_sec,
            state: Mutex::new(BucketState {
                tokens: rate_per_sec,
                last_refill: clock.now(),
            }),
        }
    }

    fn refill(&self, now: DateTime<Utc>) {
        let mut state = self.state.lock().unwrap();
        let elapsed = (now - state.last_refill).num_milliseconds().max(0) as f64 / 1000.0;
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Returns the number of milliseconds the caller must wait before a
    /// token is available, or `0` if one was taken immediately.
    fn try_acquire(&self, now: DateTime<Utc>) -> u64 {
        self.refill(now);
        let mut state = self.state.lock().unwrap();
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            0
        } else {
            let deficit = 1.0 - state.tokens;
            ((deficit / self.refill_per_sec) * 1000.0).ceil() as u64
        }
    }

    /// Blocks until a token is available, then consumes it.
    pub async fn acquire(&self, clock: &dyn Clock) {
        loop {
            let wait_ms = self.try_acquire(clock.now());
            if wait_ms == 0 {
                return;
            }
            sleep(Duration::from_millis(wait_ms)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cortex_ports::FixedClock;

    #[tokio::test]
    async fn test_bucket_allows_burst_up_to_capacity() {
        let clock = FixedClock(Utc::now());
        let bucket = TokenBucket::new(3.0, &clock);
        for _ in 0..3 {
            bucket.acquire(&clock).await;
        }
        // Fourth request at the same instant must wait.
        let wait = bucket.try_acquire(clock.now());
        assert!(wait > 0);
    }

    #[tokio::test]
    async fn test_bucket_refills_over_time() {
        let start = Utc::now();
        let clock = FixedClock(start);
        let bucket = TokenBucket::new(1.0, &clock);
        bucket.acquire(&clock).await;
        assert!(bucket.try_acquire(start) > 0);

        let later = FixedClock(start + chrono::Duration::seconds(2));
        assert_eq!(bucket.try_acquire(later.now()), 0);
    }
}
