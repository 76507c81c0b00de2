//! Two-phase reconnect backoff.
//!
//! ```text
//! Quick phase (attempt <= quick_max_retries, attempt starts at 1):
//!     delay = quick_initial_delay * attempt - random(0, quick_initial_delay)
//!
//! Post-quick phase (attempt restarts at 1):
//!     CONSTANT_WINDOW_BACKOFF        delay = interval
//!     TRUNCATED_EXPONENTIAL_BACKOFF  delay = min(interval * 2^attempt
//!                                                - random(0, interval * attempt),
//!                                                max_delay)
//! ```
//!
//! Post-quick delays are never shorter than [`ATYPICAL_DELAY_FLOOR`]. Quick
//! delays are held to the same floor when the failure was detected slowly.

use crate::config::{ReconnectConfig, ATYPICAL_DELAY_FLOOR};
use crate::policy::ReconnectPolicy;
use rand::Rng;
use std::time::Duration;

/// Which half of the backoff schedule is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPhase {
    /// Short linear delays right after a failure.
    Quick,
    /// Policy-driven delays once the quick retries are spent.
    PostQuick,
}

/// Backoff progress since the last successful connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectContext {
    /// Active phase.
    pub phase: ReconnectPhase,
    /// Attempt number within the phase (1-based once an attempt is scheduled).
    pub attempt_count: u32,
}

impl Default for ReconnectContext {
    fn default() -> Self {
        Self {
            phase: ReconnectPhase::Quick,
            attempt_count: 0,
        }
    }
}

/// Computes the delay before each reconnect attempt.
#[derive(Debug, Clone)]
pub struct ReconnectScheduler {
    config: ReconnectConfig,
    context: ReconnectContext,
}

impl ReconnectScheduler {
    /// Creates a scheduler starting in the quick phase.
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            context: ReconnectContext::default(),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Returns the current backoff progress.
    pub fn context(&self) -> ReconnectContext {
        self.context
    }

    /// Returns to the quick phase. Called on every successful connection.
    pub fn reset(&mut self) {
        self.context = ReconnectContext::default();
    }

    /// Advances the schedule and returns the delay before the next attempt.
    ///
    /// `atypical` marks a failure that took a long time to detect; the quick
    /// phase delay is then raised to at least [`ATYPICAL_DELAY_FLOOR`].
    pub fn next_delay<R: Rng>(&mut self, atypical: bool, rng: &mut R) -> Duration {
        self.context.attempt_count = self.context.attempt_count.saturating_add(1);

        if self.context.phase == ReconnectPhase::Quick
            && self.context.attempt_count > self.config.quick_max_retries
        {
            self.context.phase = ReconnectPhase::PostQuick;
            self.context.attempt_count = 1;
        }

        let attempt = self.context.attempt_count;
        match self.context.phase {
            ReconnectPhase::Quick => {
                let delay = quick_delay(self.config.quick_initial_delay, attempt, rng);
                if atypical {
                    delay.max(ATYPICAL_DELAY_FLOOR)
                } else {
                    delay
                }
            }
            ReconnectPhase::PostQuick => {
                let delay = match self.config.policy {
                    ReconnectPolicy::ConstantWindowBackoff => self.config.time_interval,
                    ReconnectPolicy::TruncatedExponentialBackoff => truncated_exponential_delay(
                        self.config.time_interval,
                        self.config.max_delay,
                        attempt,
                        rng,
                    ),
                };
                delay.max(ATYPICAL_DELAY_FLOOR)
            }
        }
    }
}

fn as_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// `initial * attempt - random(0, initial]`, i.e. a value in
/// `[initial * (attempt - 1), initial * attempt)`.
fn quick_delay<R: Rng>(initial: Duration, attempt: u32, rng: &mut R) -> Duration {
    let initial_ms = as_millis(initial);
    let base = initial_ms.saturating_mul(u64::from(attempt));
    let jitter = if initial_ms == 0 {
        0
    } else {
        rng.random_range(1..=initial_ms)
    };
    Duration::from_millis(base.saturating_sub(jitter))
}

fn truncated_exponential_delay<R: Rng>(
    interval: Duration,
    max_delay: Duration,
    attempt: u32,
    rng: &mut R,
) -> Duration {
    let interval_ms = as_millis(interval);
    let base = interval_ms.saturating_mul(2u64.saturating_pow(attempt));
    let spread = interval_ms.saturating_mul(u64::from(attempt));
    let jitter = if spread == 0 {
        0
    } else {
        rng.random_range(0..spread)
    };
    Duration::from_millis(base.saturating_sub(jitter)).min(max_delay)
}
