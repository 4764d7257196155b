//! Configuration for the sync engine.

use std::time::Duration;

/// Tuning for one adaptive rate limiter.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitConfig {
    /// Interval used before any feedback has been received.
    pub initial_interval: Duration,
    /// Floor of the interval.
    pub min_interval: Duration,
    /// Cap of the interval.
    pub max_interval: Duration,
    /// Consecutive successes needed before each decrease step.
    pub recovery_streak: u32,
    /// Above this share of the cap range, recovery halves the distance
    /// to the minimum. Below it, recovery fine-tunes.
    pub fast_recovery_ratio: f64,
    /// Share of the current distance removed per fine-tune step.
    pub fine_tune_fraction: f64,
    /// Distances at or below this snap straight to the minimum.
    pub snap_threshold: Duration,
}

impl RateLimitConfig {
    /// Creates a configuration with the given bounds and default tuning.
    pub fn new(initial: Duration, min: Duration, max: Duration) -> Self {
        Self {
            initial_interval: initial,
            min_interval: min,
            max_interval: max,
            recovery_streak: 1,
            fast_recovery_ratio: 0.25,
            fine_tune_fraction: 0.2,
            snap_threshold: Duration::from_millis(10),
        }
    }

    /// Defaults for the source device registry.
    pub fn source_registry() -> Self {
        Self::new(
            Duration::from_millis(500),
            Duration::from_millis(200),
            Duration::from_secs(120),
        )
    }

    /// Defaults for the destination CMDB.
    pub fn destination_cmdb() -> Self {
        Self::new(
            Duration::from_secs(1),
            Duration::from_millis(500),
            Duration::from_secs(120),
        )
    }

    /// A limiter that never waits. Throttling still doubles from zero to
    /// zero, so this is only useful in tests.
    pub fn unthrottled() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO, Duration::ZERO)
    }

    /// Sets the initial interval.
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    /// Sets the minimum interval.
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Sets the maximum interval.
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Sets the number of successes per decrease step.
    pub fn with_recovery_streak(mut self, streak: u32) -> Self {
        self.recovery_streak = streak.max(1);
        self
    }

    /// Sets the fast-recovery ratio.
    pub fn with_fast_recovery_ratio(mut self, ratio: f64) -> Self {
        self.fast_recovery_ratio = ratio;
        self
    }

    /// Sets the fine-tune fraction.
    pub fn with_fine_tune_fraction(mut self, fraction: f64) -> Self {
        self.fine_tune_fraction = fraction;
        self
    }

    /// Sets the snap threshold.
    pub fn with_snap_threshold(mut self, threshold: Duration) -> Self {
        self.snap_threshold = threshold;
        self
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::destination_cmdb()
    }
}

/// Configuration for sync runs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Limiter tuning for the source registry.
    pub source_limits: RateLimitConfig,
    /// Limiter tuning for the destination CMDB.
    pub destination_limits: RateLimitConfig,
    /// Throttled calls are retried at most this many times.
    pub max_throttle_retries: u32,
    /// Log a progress line every this many items (0 disables).
    pub progress_every: usize,
}

impl EngineConfig {
    /// Creates a configuration with default limiter tuning.
    pub fn new() -> Self {
        Self {
            source_limits: RateLimitConfig::source_registry(),
            destination_limits: RateLimitConfig::destination_cmdb(),
            max_throttle_retries: 5,
            progress_every: 25,
        }
    }

    /// Sets the source limiter tuning.
    pub fn with_source_limits(mut self, limits: RateLimitConfig) -> Self {
        self.source_limits = limits;
        self
    }

    /// Sets the destination limiter tuning.
    pub fn with_destination_limits(mut self, limits: RateLimitConfig) -> Self {
        self.destination_limits = limits;
        self
    }

    /// Sets the throttle retry budget per call.
    pub fn with_max_throttle_retries(mut self, retries: u32) -> Self {
        self.max_throttle_retries = retries;
        self
    }

    /// Sets the progress log cadence.
    pub fn with_progress_every(mut self, every: usize) -> Self {
        self.progress_every = every;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for the HTTP destination adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpDestinationConfig {
    /// Base URL of the CMDB API (e.g., "https://cmdb.example.com/api/v3").
    pub base_url: String,
    /// Records requested per page when listing the snapshot.
    pub page_size: u32,
    /// Times a rejected payload is stripped and re-sent.
    pub max_field_retries: u32,
    /// Times a single throttled request is re-sent in place.
    pub max_throttle_retries: u32,
}

impl HttpDestinationConfig {
    /// Creates a configuration for a base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size: 100,
            max_field_retries: 5,
            max_throttle_retries: 5,
        }
    }

    /// Sets the page size.
    pub fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = size.max(1);
        self
    }

    /// Sets the rejected-field retry budget.
    pub fn with_max_field_retries(mut self, retries: u32) -> Self {
        self.max_field_retries = retries;
        self
    }

    /// Sets how often one throttled request is re-sent.
    pub fn with_max_throttle_retries(mut self, retries: u32) -> Self {
        self.max_throttle_retries = retries;
        self
    }
}
