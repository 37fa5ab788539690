use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

/// Runtime circuit state of one upstream strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

/// Circuit breaker thresholds and timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            open_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
}

impl Default for CircuitInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_started: None,
        }
    }
}

/// Thread-safe circuit breaker guarding a single strategy.
///
/// After `failure_threshold` consecutive failures the breaker opens and the chain
/// skips the strategy until `open_timeout` has passed on the injected clock; then
/// one trial request is let through (half-open) and further requests are refused while it
/// is outstanding. A successful trial closes the breaker, a failed one re-opens it.
/// A trial that never reports back (its caller was dropped) stops blocking after
/// another `open_timeout`.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Mutex<CircuitInner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default(), Arc::new(SystemClock))
    }
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            inner: Mutex::new(CircuitInner::default()),
        }
    }

    pub fn allow_request(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                let trial_outstanding = inner
                    .trial_started
                    .is_some_and(|started| !self.cooled_down(started, now));
                if trial_outstanding {
                    return false;
                }
                inner.trial_started = Some(now);
                true
            }
            CircuitState::Open => {
                let can_try = inner
                    .opened_at
                    .is_some_and(|opened_at| self.cooled_down(opened_at, now));

                if can_try {
                    inner.state = CircuitState::HalfOpen;
                    inner.opened_at = None;
                    inner.trial_started = Some(now);
                }
                can_try
            }
        }
    }

    fn cooled_down(&self, since: Instant, now: Instant) -> bool {
        now.saturating_duration_since(since) >= self.config.open_timeout
    }

    pub fn record_success(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_started = None;
    }

    /// Records a failure; returns `true` when this failure opened the breaker.
    pub fn record_failure(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.lock();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);

        let should_open = inner.state == CircuitState::HalfOpen
            || (inner.state == CircuitState::Closed
                && inner.consecutive_failures >= self.config.failure_threshold);
        if should_open {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            inner.trial_started = None;
        }
        should_open
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn lock(&self) -> MutexGuard<'_, CircuitInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
