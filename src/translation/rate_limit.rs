/*!
 * Shared requests-per-minute limiter.
 *
 * A sliding one-minute window of call timestamps guarded by a mutex. Callers
 * that find the window full sleep until the oldest call leaves it; the lock
 * is never held across an await.
 */

use log::debug;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding window rate limiter shared by every oracle caller
#[derive(Debug)]
pub struct RateLimiter {
    /// Calls allowed per window; None disables limiting
    limit: Option<usize>,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Limiter allowing `requests_per_minute` calls; None or 0 means unlimited
    pub fn new(requests_per_minute: Option<u32>) -> Self {
        Self::with_window(requests_per_minute, WINDOW)
    }

    pub fn with_window(limit: Option<u32>, window: Duration) -> Self {
        Self {
            limit: limit.filter(|l| *l > 0).map(|l| l as usize),
            window,
            calls: Mutex::new(VecDeque::new()),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    pub fn is_limited(&self) -> bool {
        self.limit.is_some()
    }

    /// Wait for a free slot and claim it
    pub async fn acquire(&self) {
        let Some(limit) = self.limit else {
            return;
        };

        loop {
            let wait = {
                let mut calls = self.calls.lock();
                let now = Instant::now();
                while calls.front().is_some_and(|t| now.duration_since(*t) >= self.window) {
                    calls.pop_front();
                }
                if calls.len() < limit {
                    calls.push_back(now);
                    return;
                }
                match calls.front() {
                    Some(oldest) => self.window.saturating_sub(now.duration_since(*oldest)),
                    None => Duration::ZERO,
                }
            };
            debug!("Rate limit reached, waiting {:?} for a free slot", wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Calls currently inside the window
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        self.calls
            .lock()
            .iter()
            .filter(|t| now.duration_since(**t) < self.window)
            .count()
    }
}
