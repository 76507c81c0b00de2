//! Reconnection policies used after the quick reconnect phase.

use std::fmt;
use std::str::FromStr;
use tidewire_core::ConfigError;

/// Backoff policy applied once the quick reconnect phase is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// Wait `reconnect_time_interval` between every attempt.
    ConstantWindowBackoff,

    /// `min(interval * 2^n - random(0, interval * n), max_delay)`.
    #[default]
    TruncatedExponentialBackoff,
}

impl ReconnectPolicy {
    /// Returns the canonical name of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConstantWindowBackoff => "CONSTANT_WINDOW_BACKOFF",
            Self::TruncatedExponentialBackoff => "TRUNCATED_EXPONENTIAL_BACKOFF",
        }
    }
}

impl fmt::Display for ReconnectPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReconnectPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "CONSTANT_WINDOW_BACKOFF" => Ok(Self::ConstantWindowBackoff),
            "TRUNCATED_EXPONENTIAL_BACKOFF" => Ok(Self::TruncatedExponentialBackoff),
            other => Err(ConfigError::InvalidPolicy(other.to_string())),
        }
    }
}
