//! Minimum spacing between outbound API calls.
//!
//! Habitica asks background scripts to wait 30 seconds between calls. Every
//! call the `SessionManager` issues, login included, reserves a slot here
//! first and sleeps until the slot opens.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// Shared gate spacing calls at least `interval` apart.
///
/// Slots are handed out in reservation order, so concurrent callers queue
/// behind each other instead of all firing once the interval elapses.
#[derive(Debug)]
pub struct Throttle {
    limiter: Mutex<IntervalLimiter>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            limiter: Mutex::new(IntervalLimiter::new(interval)),
        }
    }

    /// Wait until the caller may issue its call. Returns the time waited.
    pub async fn wait(&self) -> Duration {
        let wait = { self.limiter.lock().await.reserve() };
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis() as u64, "throttling outbound call");
            sleep(wait).await;
        }
        wait
    }
}
