//! Reconnect-rate guard.
//!
//! Keeps the instants of the reconnect attempts made during the last 3
//! minutes, evicting older ones lazily on each new attempt. The guard trips
//! once when the count exceeds the threshold and re-arms after the count has
//! fallen back to the threshold. It never stops reconnection; it only reports
//! instability.

use crate::config::RECONNECT_RATE_WINDOW;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Tracks reconnect attempts over a sliding window.
#[derive(Debug, Clone)]
pub struct ReconnectRateGuard {
    /// Attempts tolerated per window.
    threshold: usize,
    window: Duration,
    /// Attempt instants, oldest first.
    attempts: VecDeque<Instant>,
    /// Whether the current burst was already reported.
    tripped: bool,
}

impl ReconnectRateGuard {
    /// Creates a guard with the standard 3-minute window.
    pub fn new(threshold: usize) -> Self {
        Self::with_window(threshold, RECONNECT_RATE_WINDOW)
    }

    /// Creates a guard with a custom window length.
    pub fn with_window(threshold: usize, window: Duration) -> Self {
        Self {
            threshold,
            window,
            attempts: VecDeque::new(),
            tripped: false,
        }
    }

    /// Records one attempt at `now`.
    ///
    /// Returns `Some(attempts)` when this attempt takes the count within the
    /// window past the threshold and the guard is armed, `None` otherwise.
    pub fn record_attempt(&mut self, now: Instant) -> Option<usize> {
        self.evict(now);
        if self.attempts.len() <= self.threshold {
            self.tripped = false;
        }

        self.attempts.push_back(now);
        if self.attempts.len() > self.threshold && !self.tripped {
            self.tripped = true;
            return Some(self.attempts.len());
        }
        None
    }

    /// Returns the attempts made within the window ending at `now`.
    pub fn attempts_in_window(&self, now: Instant) -> usize {
        self.attempts
            .iter()
            .filter(|at| now.duration_since(**at) < self.window)
            .count()
    }

    fn evict(&mut self, now: Instant) {
        while let Some(oldest) = self.attempts.front() {
            if now.duration_since(*oldest) >= self.window {
                self.attempts.pop_front();
            } else {
                break;
            }
        }
    }
}

impl Default for ReconnectRateGuard {
    fn default() -> Self {
        Self::new(15)
    }
}
