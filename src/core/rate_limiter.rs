//! Non-blocking fixed-window rate limiter guarding the AI tier
//!
//! The limiter hands out at most `limit` permits per window. [`RateLimiter::allow`]
//! never waits: callers that are denied skip the AI tier for that transaction.
//! Window resets depend only on the time elapsed since the window started.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Window {
    started: Instant,
    used: u32,
}

/// Thread-safe per-window call budget
#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    state: Mutex<Window>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` calls per `window`
    ///
    /// A limit of zero denies every call.
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(Window {
                started: Instant::now(),
                used: 0,
            }),
        }
    }

    /// Create a limiter allowing `requests` calls per minute
    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    /// Consume one permit if available
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    pub(crate) fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if now.saturating_duration_since(state.started) >= self.window {
            state.started = now;
            state.used = 0;
        }

        if state.used < self.limit {
            state.used += 1;
            true
        } else {
            false
        }
    }

    /// Permits left in the current window
    pub fn remaining(&self) -> u32 {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.started.elapsed() >= self.window {
            self.limit
        } else {
            self.limit.saturating_sub(state.used)
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
