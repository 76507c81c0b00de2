use crate::policy::ReconnectPolicy;
use std::time::Duration;
use tidewire_core::ConfigError;

/// Length of the window over which reconnect attempts are counted.
pub const RECONNECT_RATE_WINDOW: Duration = Duration::from_secs(3 * 60);

/// Lower bound applied to delays computed for slowly failing connections and to
/// every post-quick delay.
pub const ATYPICAL_DELAY_FLOOR: Duration = Duration::from_secs(10);

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Base delay of the quick reconnect phase.
    pub(crate) quick_initial_delay: Duration,

    /// Number of attempts made in the quick reconnect phase.
    pub(crate) quick_max_retries: u32,

    /// Policy used once the quick phase is exhausted.
    pub(crate) policy: ReconnectPolicy,

    /// Interval used by the post-quick policies.
    pub(crate) time_interval: Duration,

    /// Upper bound for `TruncatedExponentialBackoff`.
    pub(crate) max_delay: Duration,

    /// Consecutive failed attempts that trigger a server-down notification.
    pub(crate) failed_attempts_before_down: u32,

    /// Attempts per window above which the rate guard trips.
    pub(crate) rate_threshold: usize,
}

impl ReconnectConfig {
    /// Creates a new builder for configuring reconnection behavior.
    pub fn builder() -> ReconnectConfigBuilder {
        ReconnectConfigBuilder::default()
    }

    /// Returns the quick reconnect base delay.
    pub fn quick_initial_delay(&self) -> Duration {
        self.quick_initial_delay
    }

    /// Returns the maximum number of quick reconnect attempts.
    pub fn quick_max_retries(&self) -> u32 {
        self.quick_max_retries
    }

    /// Returns the post-quick reconnection policy.
    pub fn policy(&self) -> ReconnectPolicy {
        self.policy
    }

    /// Returns the post-quick time interval.
    pub fn time_interval(&self) -> Duration {
        self.time_interval
    }

    /// Returns the cap of the truncated exponential policy.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns how many consecutive failures trigger a server-down notification.
    pub fn failed_attempts_before_down(&self) -> u32 {
        self.failed_attempts_before_down
    }

    /// Returns the reconnect-rate threshold per window.
    pub fn rate_threshold(&self) -> usize {
        self.rate_threshold
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfigBuilder::default().build()
    }
}

/// Builder for constructing a `ReconnectConfig`.
///
/// Setters whose argument can be out of range validate it immediately and
/// return a [`ConfigError`], so a bad value is reported at the call that
/// supplied it.
#[derive(Debug, Clone)]
pub struct ReconnectConfigBuilder {
    quick_initial_delay: Duration,
    quick_max_retries: u32,
    policy: ReconnectPolicy,
    time_interval: Duration,
    max_delay: Duration,
    failed_attempts_before_down: u32,
    rate_threshold: usize,
}

impl ReconnectConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base delay of the quick reconnect phase. Default 5 seconds.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tidewire_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .quick_reconnect_initial_delay(Duration::from_secs(1))
    ///     .build();
    /// assert_eq!(config.quick_initial_delay(), Duration::from_secs(1));
    /// ```
    pub fn quick_reconnect_initial_delay(mut self, delay: Duration) -> Self {
        self.quick_initial_delay = delay;
        self
    }

    /// Sets the number of quick reconnect attempts. Default 3.
    pub fn quick_reconnect_max_retries(mut self, retries: u32) -> Self {
        self.quick_max_retries = retries;
        self
    }

    /// Sets the policy used after the quick phase.
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the policy by its canonical name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPolicy`] for an unknown name.
    pub fn policy_name(mut self, name: &str) -> Result<Self, ConfigError> {
        self.policy = name.parse()?;
        Ok(self)
    }

    /// Sets the post-quick time interval. Default 20 seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for a zero interval.
    pub fn reconnect_time_interval(mut self, interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "reconnect_time_interval",
                reason: "must be greater than zero",
            });
        }
        self.time_interval = interval;
        Ok(self)
    }

    /// Sets the cap of the truncated exponential policy. Default 360 seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the cap is below the
    /// 10-second floor every post-quick delay is held to.
    pub fn reconnect_max_delay(mut self, max_delay: Duration) -> Result<Self, ConfigError> {
        if max_delay < ATYPICAL_DELAY_FLOOR {
            return Err(ConfigError::InvalidValue {
                name: "reconnect_max_delay",
                reason: "must be at least 10 seconds",
            });
        }
        self.max_delay = max_delay;
        Ok(self)
    }

    /// Sets how many consecutive failed attempts trigger a server-down
    /// notification. Default 1.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for zero.
    pub fn failed_attempts_before_down(mut self, attempts: u32) -> Result<Self, ConfigError> {
        if attempts == 0 {
            return Err(ConfigError::InvalidValue {
                name: "failed_attempts_before_down",
                reason: "must be at least 1",
            });
        }
        self.failed_attempts_before_down = attempts;
        Ok(self)
    }

    /// Sets the number of reconnect attempts per 3-minute window tolerated
    /// before the rate guard trips. Default 15.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for zero.
    pub fn reconnect_rate_threshold(mut self, threshold: usize) -> Result<Self, ConfigError> {
        if threshold == 0 {
            return Err(ConfigError::InvalidValue {
                name: "reconnect_rate_threshold",
                reason: "must be at least 1",
            });
        }
        self.rate_threshold = threshold;
        Ok(self)
    }

    /// Builds the `ReconnectConfig`.
    pub fn build(self) -> ReconnectConfig {
        ReconnectConfig {
            quick_initial_delay: self.quick_initial_delay,
            quick_max_retries: self.quick_max_retries,
            policy: self.policy,
            time_interval: self.time_interval,
            max_delay: self.max_delay,
            failed_attempts_before_down: self.failed_attempts_before_down,
            rate_threshold: self.rate_threshold,
        }
    }
}

impl Default for ReconnectConfigBuilder {
    fn default() -> Self {
        Self {
            quick_initial_delay: Duration::from_secs(5),
            quick_max_retries: 3,
            policy: ReconnectPolicy::default(),
            time_interval: Duration::from_secs(20),
            max_delay: Duration::from_secs(360),
            failed_attempts_before_down: 1,
            rate_threshold: 15,
        }
    }
}
