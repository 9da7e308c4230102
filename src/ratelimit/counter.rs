//! Sliding window counter implementation.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::limiter::LimiterSettings;

/// Per-key state for the sliding window counter.
///
/// Two fixed windows are kept: the active one and the one immediately before
/// it. The previous window's count is blended into the current decision with
/// a weight that decays linearly from 1 to 0 over the active window.
///
/// All reads and writes go through a single mutex, so every call is one
/// serialized critical section for its key.
#[derive(Debug)]
pub struct WindowCounter {
    settings: Arc<LimiterSettings>,
    state: Mutex<WindowState>,
}

#[derive(Debug, Clone, Copy)]
struct WindowState {
    curr_window_start: i64,
    curr_window_count: u64,
    prev_window_start: i64,
    prev_window_count: u64,
}

/// A point-in-time view of a counter, taken after sliding to `now`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSnapshot {
    pub curr_window_start: i64,
    pub curr_window_count: u64,
    pub prev_window_start: i64,
    pub prev_window_count: u64,
    /// Fraction of the previous window still counted, in `[0, 1]`.
    pub overlap: f64,
    /// Decayed previous count plus the current count.
    pub weighted_count: f64,
}

impl WindowState {
    fn new(now: i64, window: i64) -> Self {
        Self {
            curr_window_start: now,
            curr_window_count: 0,
            prev_window_start: now.saturating_sub(window),
            prev_window_count: 0,
        }
    }

    /// Roll the active window into the previous slot once it has elapsed.
    ///
    /// Returns `true` if a slide happened.
    fn slide(&mut self, now: i64, window: i64) -> bool {
        if now.saturating_sub(self.curr_window_start) < window {
            return false;
        }

        self.prev_window_start = self.curr_window_start;
        self.prev_window_count = self.curr_window_count;
        self.curr_window_start = now;
        self.curr_window_count = 0;
        true
    }

    fn overlap(&self, now: i64, window: i64) -> f64 {
        let elapsed = now.saturating_sub(self.curr_window_start) as f64;
        // Clamped on both ends: a clock read behind the window start must not
        // inflate the previous window's weight above 1.
        (1.0 - elapsed / window as f64).clamp(0.0, 1.0)
    }

    fn weighted_count(&self, now: i64, window: i64) -> f64 {
        self.prev_window_count as f64 * self.overlap(now, window) + self.curr_window_count as f64
    }
}

impl WindowCounter {
    /// Create a counter whose active window starts at `now`.
    ///
    /// The previous window is empty and ends exactly at `now`.
    pub fn new(settings: Arc<LimiterSettings>, now: i64) -> Self {
        let state = WindowState::new(now, settings.window_size_ms_i64());
        Self {
            settings,
            state: Mutex::new(state),
        }
    }

    /// Try to admit one request at `now`.
    ///
    /// Returns `true` and records the request if the weighted count is below
    /// the limit, `false` otherwise. A rejected request leaves the counts
    /// untouched.
    pub fn try_acquire(&self, now: i64) -> bool {
        let window = self.settings.window_size_ms_i64();
        let limit = self.settings.max_requests() as f64;

        let mut state = self.state.lock();
        self.advance_window(&mut state, now, window);

        let weighted = state.weighted_count(now, window);
        if weighted < limit {
            state.curr_window_count += 1;
            true
        } else {
            false
        }
    }

    /// Estimate of requests in the effective window at `now`, rounded up.
    ///
    /// Does not admit anything, but may slide the window forward.
    pub fn current_count(&self, now: i64) -> u64 {
        let window = self.settings.window_size_ms_i64();

        let mut state = self.state.lock();
        self.advance_window(&mut state, now, window);
        state.weighted_count(now, window).ceil() as u64
    }

    /// Slide to `now` and report the full window state.
    pub fn snapshot(&self, now: i64) -> WindowSnapshot {
        let window = self.settings.window_size_ms_i64();

        let mut state = self.state.lock();
        self.advance_window(&mut state, now, window);

        WindowSnapshot {
            curr_window_start: state.curr_window_start,
            curr_window_count: state.curr_window_count,
            prev_window_start: state.prev_window_start,
            prev_window_count: state.prev_window_count,
            overlap: state.overlap(now, window),
            weighted_count: state.weighted_count(now, window),
        }
    }

    fn advance_window(&self, state: &mut WindowState, now: i64, window: i64) {
        let carried = state.curr_window_count;
        if state.slide(now, window) {
            trace!(
                window_start = now,
                carried_count = carried,
                "Window slid"
            );
        }
    }
}
