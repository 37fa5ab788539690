use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request budget for a rate-limited upstream.
///
/// A strategy with an exhausted budget is skipped rather than delayed: the chain
/// moves on to the next strategy immediately.
#[derive(Clone)]
pub struct RateBudget {
    limiter: Arc<DirectRateLimiter>,
    window: Duration,
    limit: u32,
}

impl RateBudget {
    pub fn new(window: Duration, limit: u32) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_from_window(window, limit))),
            window,
            limit: limit.max(1),
        }
    }

    pub fn per_minute(limit: u32) -> Self {
        Self::new(Duration::from_secs(60), limit)
    }

    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    pub const fn limit(&self) -> u32 {
        self.limit
    }
}

impl std::fmt::Debug for RateBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateBudget")
            .field("window", &self.window)
            .field("limit", &self.limit)
            .finish()
    }
}

fn quota_from_window(window: Duration, limit: u32) -> Quota {
    let safe_limit = limit.max(1);
    let burst = NonZeroU32::new(safe_limit).unwrap_or(NonZeroU32::MIN);

    let seconds_per_cell = (window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(burst))
        .allow_burst(burst)
}
