// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Circuit breaker guarding calls to the upstream ticket source.
//!
//! State machine: CLOSED -> OPEN on a sliding window of failures crossing
//! `failure_threshold`; OPEN -> HALF_OPEN once `timeout` has elapsed since
//! tripping; HALF_OPEN -> CLOSED after `success_threshold` consecutive
//! successful probe calls, or back to OPEN on the first probe failure.
//!
//! Breakers are held in a registry keyed by dependency name behind a
//! `parking_lot::Mutex`, since multiple tenants' ingestion runs probe the
//! same breaker concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub window_size: usize,
    pub timeout: Duration,
    pub half_open_max_calls: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 1,
            window_size: 10,
            timeout: Duration::from_secs(30),
            half_open_max_calls: 1,
        }
    }
}

struct Inner {
    state: BreakerState,
    // Most recent calls, true = success. Bounded to `window_size`.
    window: std::collections::VecDeque<bool>,
    opened_at: Option<Instant>,
    half_open_successes: u32,
    half_open_calls_in_flight: u32,
}

/// A single named circuit breaker.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

/// Status snapshot, matching the shape the original service exposed.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BreakerStatus {
    pub name: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub window_size: usize,
    pub opened_at_ms_ago: Option<u64>,
}

/// Error returned by [`CircuitBreaker::call`] when the breaker refuses the call.
#[derive(Debug, thiserror::Error)]
#[error("circuit breaker {0} is open")]
pub struct BreakerOpenError(pub String);

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: std::collections::VecDeque::with_capacity(16),
                opened_at: None,
                half_open_successes: 0,
                half_open_calls_in_flight: 0,
            }),
        }
    }

    /// Decide whether a call is currently permitted, transitioning
    /// OPEN -> HALF_OPEN if the timeout has elapsed. Call this before
    /// issuing the guarded request; call [`Self::record_success`] or
    /// [`Self::record_failure`] afterward based on the outcome.
    pub fn permit(&self) -> Result<(), BreakerOpenError> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed()).unwrap_or_default();
                if elapsed >= self.config.timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.half_open_successes = 0;
                    inner.half_open_calls_in_flight = 1;
                    Ok(())
                } else {
                    Err(BreakerOpenError(self.name.clone()))
                }
            }
            BreakerState::HalfOpen => {
                if inner.half_open_calls_in_flight < self.config.half_open_max_calls {
                    inner.half_open_calls_in_flight += 1;
                    Ok(())
                } else {
                    Err(BreakerOpenError(self.name.clone()))
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        push_window(&mut inner.window, true, self.config.window_size);

        match inner.state {
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                inner.half_open_calls_in_flight = inner.half_open_calls_in_flight.saturating_sub(1);
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.opened_at = None;
                    inner.window.clear();
                }
            }
            BreakerState::Closed => {}
            BreakerState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        push_window(&mut inner.window, false, self.config.window_size);

        match inner.state {
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                inner.half_open_calls_in_flight = 0;
            }
            BreakerState::Closed => {
                let failures = inner.window.iter().filter(|ok| !**ok).count() as u32;
                if failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                }
            }
            BreakerState::Open => {}
        }
    }

    pub fn status(&self) -> BreakerStatus {
        let inner = self.inner.lock();
        BreakerStatus {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.window.iter().filter(|ok| !**ok).count() as u32,
            window_size: inner.window.len(),
            opened_at_ms_ago: inner.opened_at.map(|at| at.elapsed().as_millis() as u64),
        }
    }

    /// Force the breaker back to CLOSED, clearing its window. Exposed for
    /// operator recovery via the admin API when a known-transient upstream
    /// incident has resolved faster than the timeout would reopen it.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.window.clear();
        inner.opened_at = None;
        inner.half_open_successes = 0;
        inner.half_open_calls_in_flight = 0;
    }
}

fn push_window(window: &mut std::collections::VecDeque<bool>, ok: bool, capacity: usize) {
    window.push_back(ok);
    while window.len() > capacity {
        window.pop_front();
    }
}

/// Registry of named breakers, one per upstream dependency (currently just
/// the ticket source, but kept keyed by name so new guarded dependencies
/// don't need a second registry).
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&self, name: &str, config: CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(name.to_owned())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, config)))
            .clone()
    }

    pub fn status_all(&self) -> Vec<BreakerStatus> {
        self.breakers.lock().values().map(|b| b.status()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            window_size: 5,
            timeout: Duration::from_millis(20),
            half_open_max_calls: 1,
        }
    }

    #[test]
    fn opens_after_failure_threshold() {
        let breaker = CircuitBreaker::new("upstream", test_config());
        for _ in 0..3 {
            breaker.permit().unwrap();
            breaker.record_failure();
        }
        assert_eq!(breaker.status().state, BreakerState::Open);
        assert!(breaker.permit().is_err());
    }

    #[test]
    fn half_opens_after_timeout_then_closes_on_success() {
        let breaker = CircuitBreaker::new("upstream", test_config());
        for _ in 0..3 {
            breaker.permit().unwrap();
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(25));

        breaker.permit().unwrap();
        assert_eq!(breaker.status().state, BreakerState::HalfOpen);
        breaker.record_success();
        breaker.permit().unwrap();
        breaker.record_success();
        assert_eq!(breaker.status().state, BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let breaker = CircuitBreaker::new("upstream", test_config());
        for _ in 0..3 {
            breaker.permit().unwrap();
            breaker.record_failure();
        }
        std::thread::sleep(Duration::from_millis(25));
        breaker.permit().unwrap();
        breaker.record_failure();
        assert_eq!(breaker.status().state, BreakerState::Open);
    }
}
