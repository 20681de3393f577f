//! Token-bucket rate limiter shared by every in-flight review.
//!
//! The LLM endpoint is the scarce resource: the worker pool may run several
//! pipelines at once, but completion calls drain one shared bucket. The
//! bucket refills continuously at the configured rate and caps at the burst
//! size, so short spikes pass through while sustained load is smoothed to
//! the steady rate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Clone-shared token bucket. `acquire` never fails; it sleeps until a
/// token is available.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    bucket: Arc<Mutex<Bucket>>,
    capacity: f64,
    refill_rate: f64,
}

impl RateLimiter {
    /// `requests_per_second` is the steady refill rate, `burst` the bucket
    /// capacity. Both are validated as positive at config load.
    pub fn new(requests_per_second: f64, burst: f64) -> Self {
        Self {
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            })),
            capacity: burst,
            refill_rate: requests_per_second,
        }
    }

    /// Takes one token, sleeping while the bucket is empty.
    pub async fn acquire(&self) {
        loop {
            match self.try_take() {
                Ok(()) => return,
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    /// Refills by elapsed time, then takes a token or reports how long the
    /// deficit takes to refill.
    fn try_take(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock().unwrap();
        let now = Instant::now();
        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - bucket.tokens;
            Err(Duration::from_secs_f64(deficit / self.refill_rate))
        }
    }
}
