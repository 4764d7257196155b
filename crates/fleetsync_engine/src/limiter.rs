//! Adaptive rate limiting.
//!
//! One [`AdaptiveRateLimiter`] exists per remote API. Every call to that API
//! first waits until the current interval has elapsed since the previous
//! call completed, then reports its outcome back so the interval can adapt:
//!
//! - a throttling response doubles the interval (honouring `Retry-After`),
//!   capped at the configured maximum
//! - successes walk the interval back down, halving the distance to the
//!   minimum while far away and shaving a fixed fraction once close
//!
//! The interval never leaves `[min_interval, max_interval]`.

use crate::adapter::{DestinationAdapter, SourceAdapter};
use crate::config::RateLimitConfig;
use crate::error::EngineResult;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use fleetsync_model::{Attributes, DestinationRecord, Endpoint, SourceRecord};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Limiter phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimiterPhase {
    /// Interval is at the minimum.
    Normal,
    /// Interval was raised by a throttling response.
    Backoff,
    /// Interval is decreasing back toward the minimum.
    Recovering,
}

/// Outcome of a gated call, as reported to the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// The call succeeded.
    Success,
    /// The remote API throttled the call.
    Throttled {
        /// Server-provided wait, if any.
        retry_after: Option<Duration>,
    },
    /// The call failed for another reason.
    Failure,
}

/// Snapshot of limiter counters.
#[derive(Debug, Clone, PartialEq)]
pub struct LimiterStats {
    /// Limiter name.
    pub name: String,
    /// Calls that passed the gate.
    pub total_calls: u64,
    /// Successful calls.
    pub successes: u64,
    /// Throttling responses received.
    pub throttled: u64,
    /// Other failures.
    pub failures: u64,
    /// Current interval.
    pub current_interval: Duration,
    /// Current phase.
    pub phase: LimiterPhase,
}

#[derive(Debug)]
struct LimiterState {
    interval: Duration,
    consecutive_successes: u32,
    last_completed: Option<Instant>,
    phase: LimiterPhase,
    total_calls: u64,
    successes: u64,
    throttled: u64,
    failures: u64,
}

/// Per-API adaptive rate limiter.
///
/// Shared by reference (usually through an `Arc`) between every call site
/// that talks to the same API.
#[derive(Debug)]
pub struct AdaptiveRateLimiter {
    name: String,
    config: RateLimitConfig,
    state: Mutex<LimiterState>,
}

impl AdaptiveRateLimiter {
    /// Creates a limiter. Inverted bounds are swapped and the initial
    /// interval is clamped into them.
    pub fn new(name: impl Into<String>, mut config: RateLimitConfig) -> Self {
        if config.min_interval > config.max_interval {
            std::mem::swap(&mut config.min_interval, &mut config.max_interval);
        }
        config.recovery_streak = config.recovery_streak.max(1);
        let interval = config
            .initial_interval
            .clamp(config.min_interval, config.max_interval);
        let phase = if interval == config.min_interval {
            LimiterPhase::Normal
        } else {
            LimiterPhase::Recovering
        };

        Self {
            name: name.into(),
            config,
            state: Mutex::new(LimiterState {
                interval,
                consecutive_successes: 0,
                last_completed: None,
                phase,
                total_calls: 0,
                successes: 0,
                throttled: 0,
                failures: 0,
            }),
        }
    }

    /// Limiter name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Limiter tuning.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Current interval.
    pub fn interval(&self) -> Duration {
        self.state.lock().interval
    }

    /// Current phase.
    pub fn phase(&self) -> LimiterPhase {
        self.state.lock().phase
    }

    /// Counter snapshot.
    pub fn stats(&self) -> LimiterStats {
        let state = self.state.lock();
        LimiterStats {
            name: self.name.clone(),
            total_calls: state.total_calls,
            successes: state.successes,
            throttled: state.throttled,
            failures: state.failures,
            current_interval: state.interval,
            phase: state.phase,
        }
    }

    /// Time left before the next call may start.
    pub fn wait_time(&self) -> Duration {
        let state = self.state.lock();
        match state.last_completed {
            Some(done) => state.interval.saturating_sub(done.elapsed()),
            None => Duration::ZERO,
        }
    }

    /// Blocks until the next call may start.
    ///
    /// Only one caller per API is expected; the lock is not held while
    /// sleeping.
    pub fn acquire(&self) {
        let wait = self.wait_time();
        if !wait.is_zero() {
            debug!(limiter = %self.name, wait_ms = wait.as_millis() as u64, "rate limit wait");
            std::thread::sleep(wait);
        }
        self.state.lock().total_calls += 1;
    }

    /// Records the outcome of a call that just completed.
    pub fn complete(&self, outcome: CallOutcome) {
        let mut state = self.state.lock();
        state.last_completed = Some(Instant::now());
        match outcome {
            CallOutcome::Success => self.on_success(&mut state),
            CallOutcome::Throttled { retry_after } => self.on_throttle(&mut state, retry_after),
            CallOutcome::Failure => {
                state.failures += 1;
                state.consecutive_successes = 0;
            }
        }
    }

    /// Runs `call` behind the gate and feeds its outcome back.
    pub fn call<T>(&self, call: impl FnOnce() -> EngineResult<T>) -> EngineResult<T> {
        self.acquire();
        let result = call();
        let outcome = match &result {
            Ok(_) => CallOutcome::Success,
            Err(e) if e.is_throttled() => CallOutcome::Throttled {
                retry_after: e.retry_after(),
            },
            Err(_) => CallOutcome::Failure,
        };
        self.complete(outcome);
        result
    }

    fn on_throttle(&self, state: &mut LimiterState, retry_after: Option<Duration>) {
        state.throttled += 1;
        state.consecutive_successes = 0;

        let doubled = state.interval.saturating_mul(2);
        let target = retry_after.map_or(doubled, |ra| doubled.max(ra));
        state.interval = target.clamp(self.config.min_interval, self.config.max_interval);
        state.phase = LimiterPhase::Backoff;

        warn!(
            limiter = %self.name,
            interval_ms = state.interval.as_millis() as u64,
            retry_after_s = retry_after.map(|d| d.as_secs()),
            "throttled, backing off"
        );
    }

    fn on_success(&self, state: &mut LimiterState) {
        state.successes += 1;
        let min = self.config.min_interval;
        if state.interval <= min {
            state.interval = min;
            state.phase = LimiterPhase::Normal;
            return;
        }

        state.consecutive_successes += 1;
        if state.consecutive_successes < self.config.recovery_streak {
            return;
        }
        state.consecutive_successes = 0;

        let distance = state.interval - min;
        let cap_range = self.config.max_interval - min;
        let ratio = if cap_range.is_zero() {
            0.0
        } else {
            distance.as_secs_f64() / cap_range.as_secs_f64()
        };

        let next = if ratio > self.config.fast_recovery_ratio {
            distance / 2
        } else {
            distance.mul_f64((1.0 - self.config.fine_tune_fraction).clamp(0.0, 1.0))
        };

        // A step that fails to shrink the distance would stall above the floor.
        if next <= self.config.snap_threshold || next >= distance {
            state.interval = min;
            state.phase = LimiterPhase::Normal;
            info!(
                limiter = %self.name,
                interval_ms = min.as_millis() as u64,
                "recovered to normal rate"
            );
        } else {
            state.interval = min + next;
            state.phase = LimiterPhase::Recovering;
            debug!(
                limiter = %self.name,
                interval_ms = state.interval.as_millis() as u64,
                "recovering"
            );
        }
    }
}

/// HTTP client whose every request passes through a limiter.
///
/// Gating happens per transport send, so paging and re-sends each wait
/// their own turn. A 429 response reports a throttle with its
/// `Retry-After`; other non-2xx responses count as failures.
pub struct RateLimitedClient<C> {
    inner: C,
    limiter: Arc<AdaptiveRateLimiter>,
}

impl<C: HttpClient> RateLimitedClient<C> {
    /// Wraps a client.
    pub fn new(inner: C, limiter: Arc<AdaptiveRateLimiter>) -> Self {
        Self { inner, limiter }
    }

    /// The limiter gating this client.
    pub fn limiter(&self) -> &Arc<AdaptiveRateLimiter> {
        &self.limiter
    }

    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: HttpClient> HttpClient for RateLimitedClient<C> {
    fn send(&self, request: &HttpRequest) -> EngineResult<HttpResponse> {
        self.limiter.acquire();
        let result = self.inner.send(request);
        let outcome = match &result {
            Ok(response) if response.status == 429 => CallOutcome::Throttled {
                retry_after: response.retry_after,
            },
            Ok(response) if response.is_success() => CallOutcome::Success,
            Ok(_) => CallOutcome::Failure,
            Err(e) if e.is_throttled() => CallOutcome::Throttled {
                retry_after: e.retry_after(),
            },
            Err(_) => CallOutcome::Failure,
        };
        self.limiter.complete(outcome);
        result
    }
}

/// Destination adapter whose every call passes through a limiter.
///
/// Used for in-process adapters where one call is one unit of remote work;
/// HTTP adapters gate per request with [`RateLimitedClient`] instead.
pub struct RateLimitedDestination<D> {
    inner: D,
    limiter: Arc<AdaptiveRateLimiter>,
}

impl<D: DestinationAdapter> RateLimitedDestination<D> {
    /// Wraps an adapter.
    pub fn new(inner: D, limiter: Arc<AdaptiveRateLimiter>) -> Self {
        Self { inner, limiter }
    }

    /// The limiter gating this adapter.
    pub fn limiter(&self) -> &Arc<AdaptiveRateLimiter> {
        &self.limiter
    }

    /// The wrapped adapter.
    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: DestinationAdapter> DestinationAdapter for RateLimitedDestination<D> {
    fn create(&self, endpoint: Endpoint, attrs: &Attributes) -> EngineResult<String> {
        self.limiter.call(|| self.inner.create(endpoint, attrs))
    }

    fn update(
        &self,
        endpoint: Option<Endpoint>,
        id: &str,
        attrs: &Attributes,
    ) -> EngineResult<()> {
        self.limiter.call(|| self.inner.update(endpoint, id, attrs))
    }

    fn delete(&self, endpoint: Endpoint, id: &str) -> EngineResult<()> {
        self.limiter.call(|| self.inner.delete(endpoint, id))
    }

    fn list(&self) -> EngineResult<Vec<DestinationRecord>> {
        self.limiter.call(|| self.inner.list())
    }
}

/// Source adapter whose fetch passes through a limiter.
pub struct RateLimitedSource<S> {
    inner: S,
    limiter: Arc<AdaptiveRateLimiter>,
}

impl<S: SourceAdapter> RateLimitedSource<S> {
    /// Wraps an adapter.
    pub fn new(inner: S, limiter: Arc<AdaptiveRateLimiter>) -> Self {
        Self { inner, limiter }
    }
}

impl<S: SourceAdapter> SourceAdapter for RateLimitedSource<S> {
    fn fetch(&self) -> EngineResult<Vec<SourceRecord>> {
        self.limiter.call(|| self.inner.fetch())
    }
}
