use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use log::*;

use crate::PaystackApiError;

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    count: u32,
    started: Instant,
}

/// Per-endpoint request counter over a fixed window.
///
/// The limiter is consulted before a request is sent and updated after it succeeds. The lock is only held for the
/// bookkeeping, never while a request is in flight.
#[derive(Debug)]
pub struct RateLimiter {
    ceiling: u32,
    window: Duration,
    windows: Mutex<HashMap<String, RateLimitWindow>>,
}

impl RateLimiter {
    pub fn new(ceiling: u32, window: Duration) -> Self {
        Self { ceiling, window, windows: Mutex::new(HashMap::new()) }
    }

    /// Fails with [`PaystackApiError::RateLimited`] if `endpoint` has used up its allowance in the current window.
    pub fn check(&self, endpoint: &str) -> Result<(), PaystackApiError> {
        self.check_at(endpoint, Instant::now())
    }

    /// Counts one successful request against `endpoint`.
    pub fn record(&self, endpoint: &str) {
        self.record_at(endpoint, Instant::now())
    }

    /// The number of requests counted in the live window for `endpoint`.
    pub fn current_count(&self, endpoint: &str) -> u32 {
        let now = Instant::now();
        let key = window_key(endpoint);
        self.lock()
            .get(&key)
            .filter(|w| now.duration_since(w.started) < self.window)
            .map(|w| w.count)
            .unwrap_or_default()
    }

    fn check_at(&self, endpoint: &str, now: Instant) -> Result<(), PaystackApiError> {
        let key = window_key(endpoint);
        let windows = self.lock();
        match windows.get(&key) {
            Some(w) if now.duration_since(w.started) < self.window && w.count >= self.ceiling => {
                warn!("💳️ Rate limit of {} calls per {:?} reached for {key}", self.ceiling, self.window);
                Err(PaystackApiError::RateLimited { endpoint: key })
            },
            _ => Ok(()),
        }
    }

    fn record_at(&self, endpoint: &str, now: Instant) {
        let key = window_key(endpoint);
        let mut windows = self.lock();
        let window = self.window;
        windows
            .entry(key)
            .and_modify(|w| {
                if now.duration_since(w.started) >= window {
                    w.count = 1;
                    w.started = now;
                } else {
                    w.count += 1;
                }
            })
            .or_insert(RateLimitWindow { count: 1, started: now });
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, RateLimitWindow>> {
        // The map holds plain counters, so a panic elsewhere cannot leave it in a broken state
        self.windows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Calls to the same route share a window regardless of path parameters or query string, so
/// `/transaction/verify/REF1` and `/transaction/verify/REF2` count against `/transaction/verify`.
fn window_key(endpoint: &str) -> String {
    let path = endpoint.split('?').next().unwrap_or_default();
    let segments = path.split('/').filter(|s| !s.is_empty()).take(2).collect::<Vec<_>>();
    format!("/{}", segments.join("/"))
}
