//! Request pacing for the E-utilities client.
//!
//! NCBI enforces per-key request rates. The limiter guarantees that no two
//! outbound requests from one client are issued closer together than the
//! tier's minimum interval, regardless of caller concurrency: the mutex is
//! held across the wait, so concurrent callers serialize on it.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Time source seam so pacing is testable without real sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Waits until the minimum interval since the previous request has
    /// elapsed, then claims the next request slot. Returns the claimed
    /// instant.
    pub async fn pace(&self, clock: &dyn Clock) -> Instant {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = clock.now().duration_since(previous);
            if elapsed < self.min_interval {
                clock.sleep(self.min_interval - elapsed).await;
            }
        }
        let claimed = clock.now();
        *last = Some(claimed);
        claimed
    }
}
