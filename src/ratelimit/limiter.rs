//! Core rate limiter implementation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::clock::{Clock, SystemClock};
use super::counter::WindowCounter;
use super::registry::KeyRegistry;
use crate::error::{KeygateError, Result};

/// Limits enforced for every key of one limiter.
///
/// Always valid once constructed: both fields are positive and the window
/// fits in a signed millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLimiterSettings")]
pub struct LimiterSettings {
    /// Requests admitted per full window
    max_requests: u32,
    /// Window duration in milliseconds
    window_size_ms: u64,
}

#[derive(Deserialize)]
struct RawLimiterSettings {
    max_requests: u32,
    window_size_ms: u64,
}

impl TryFrom<RawLimiterSettings> for LimiterSettings {
    type Error = KeygateError;

    fn try_from(raw: RawLimiterSettings) -> Result<Self> {
        Self::new(raw.max_requests, raw.window_size_ms)
    }
}

impl LimiterSettings {
    /// Validate and build limiter settings.
    pub fn new(max_requests: u32, window_size_ms: u64) -> Result<Self> {
        if max_requests == 0 {
            return Err(KeygateError::Config(
                "max_requests must be greater than zero".to_string(),
            ));
        }

        if window_size_ms == 0 {
            return Err(KeygateError::Config(
                "window_size_ms must be greater than zero".to_string(),
            ));
        }

        if window_size_ms > i64::MAX as u64 {
            return Err(KeygateError::Config(format!(
                "window_size_ms must not exceed {}",
                i64::MAX
            )));
        }

        Ok(Self {
            max_requests,
            window_size_ms,
        })
    }

    /// Get the maximum number of requests per window.
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Get the window duration in milliseconds.
    pub fn window_size_ms(&self) -> u64 {
        self.window_size_ms
    }

    pub(crate) fn window_size_ms_i64(&self) -> i64 {
        // Bounded by the check in `new`
        self.window_size_ms as i64
    }
}

/// Per-key rate limiter using a sliding window counter.
///
/// This struct is thread-safe and is meant to be shared behind an `Arc`.
/// Calls for the same key are serialized; calls for different keys proceed
/// in parallel.
pub struct RateLimiter {
    /// Limits shared by all counters
    settings: Arc<LimiterSettings>,
    /// Window counters indexed by key
    counters: KeyRegistry<String>,
    /// Source of the current instant
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a rate limiter backed by the system clock.
    pub fn new(max_requests: u32, window_size_ms: u64) -> Result<Self> {
        let settings = LimiterSettings::new(max_requests, window_size_ms)?;
        Ok(Self::with_clock(settings, Arc::new(SystemClock)))
    }

    /// Create a rate limiter reading time from `clock`.
    pub fn with_clock(settings: LimiterSettings, clock: Arc<dyn Clock>) -> Self {
        debug!(
            max_requests = settings.max_requests(),
            window_size_ms = settings.window_size_ms(),
            "Creating rate limiter"
        );

        Self {
            settings: Arc::new(settings),
            counters: KeyRegistry::new(),
            clock,
        }
    }

    /// Decide whether a request for `key` is admitted right now.
    ///
    /// An admitted request is counted against the key's window.
    pub fn allow_request(&self, key: &str) -> bool {
        let now = self.clock.now_millis();

        let counter = self.counters.get_or_create(key, || {
            debug!(
                key = %key,
                max_requests = self.settings.max_requests(),
                window_size_ms = self.settings.window_size_ms(),
                "Creating new window counter"
            );
            WindowCounter::new(Arc::clone(&self.settings), now)
        });

        let admitted = counter.try_acquire(now);

        trace!(
            key = %key,
            now = now,
            admitted = admitted,
            "Checked rate limit"
        );

        if !admitted {
            debug!(key = %key, "Rate limit exceeded");
        }

        admitted
    }

    /// Estimated number of requests for `key` in the effective window.
    ///
    /// Returns 0 for a key that has never been seen, without tracking it.
    pub fn current_count(&self, key: &str) -> u64 {
        match self.counters.lookup(key) {
            Some(counter) => counter.current_count(self.clock.now_millis()),
            None => 0,
        }
    }

    /// Get the settings this limiter enforces.
    pub fn settings(&self) -> &LimiterSettings {
        &self.settings
    }

    /// Get the number of keys being tracked.
    pub fn tracked_keys(&self) -> usize {
        self.counters.len()
    }
}
