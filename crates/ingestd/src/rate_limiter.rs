// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sliding-window rate limiter guarding the global request budget.
//!
//! A deque of grant timestamps behind a single lock: `try_acquire` evicts
//! anything older than the window, then admits the call only if the
//! remaining count is under the limit.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;

/// A single sliding-window limiter over a fixed request budget.
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    timestamps: Mutex<VecDeque<std::time::Instant>>,
}

/// Snapshot of a limiter's current state, mirroring the shape the original
/// service exposed over `/status` endpoints.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RateLimiterStatus {
    pub limit: u32,
    pub window_seconds: u64,
    pub current_requests: u32,
    pub remaining: u32,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window, timestamps: Mutex::new(VecDeque::new()) }
    }

    /// Attempt to record one request against the budget.
    ///
    /// Returns `Ok(())` if the request fits within the window, or
    /// `Err(wait)` with the duration until the oldest recorded request ages
    /// out of the window and a slot frees up. Never blocks — callers decide
    /// whether to retry, queue, or reject.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let now = std::time::Instant::now();
        let mut timestamps = self.timestamps.lock();
        evict_expired(&mut timestamps, now, self.window);

        if (timestamps.len() as u32) < self.limit {
            timestamps.push_back(now);
            return Ok(());
        }

        // VecDeque is maintained in arrival order, so the front is always
        // the next entry to expire.
        let oldest = timestamps.front().copied().unwrap_or(now);
        let wait = self.window.saturating_sub(now.saturating_duration_since(oldest));
        Err(wait)
    }

    pub fn status(&self) -> RateLimiterStatus {
        let now = std::time::Instant::now();
        let mut timestamps = self.timestamps.lock();
        evict_expired(&mut timestamps, now, self.window);
        let current = timestamps.len() as u32;
        RateLimiterStatus {
            limit: self.limit,
            window_seconds: self.window.as_secs(),
            current_requests: current,
            remaining: self.limit.saturating_sub(current),
        }
    }
}

fn evict_expired(
    timestamps: &mut VecDeque<std::time::Instant>,
    now: std::time::Instant,
    window: Duration,
) {
    while let Some(&front) = timestamps.front() {
        if now.saturating_duration_since(front) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_the_limit_then_rejects() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_ok());
        let err = limiter.try_acquire();
        assert!(err.is_err());
        assert!(err.unwrap_err() <= Duration::from_secs(60));
    }

    #[test]
    fn status_reports_remaining_budget() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        limiter.try_acquire().unwrap();
        limiter.try_acquire().unwrap();
        let status = limiter.status();
        assert_eq!(status.limit, 5);
        assert_eq!(status.current_requests, 2);
        assert_eq!(status.remaining, 3);
    }

    #[test]
    fn window_slides_as_entries_age_out() {
        let limiter = RateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.try_acquire().is_ok());
        assert!(limiter.try_acquire().is_err());
        std::thread::sleep(Duration::from_millis(25));
        assert!(limiter.try_acquire().is_ok());
    }

    proptest::proptest! {
        /// However many times `try_acquire` is hammered within a single
        /// window, the number of grants never exceeds the configured limit —
        /// the budget itself is the safety property, not the timing.
        #[test]
        fn never_grants_more_than_the_limit_within_a_window(
            limit in 1u32..20,
            attempts in 0usize..100,
        ) {
            let limiter = RateLimiter::new(limit, Duration::from_secs(60));
            let granted = (0..attempts).filter(|_| limiter.try_acquire().is_ok()).count();
            proptest::prop_assert!(granted as u32 <= limit);
        }
    }
}
