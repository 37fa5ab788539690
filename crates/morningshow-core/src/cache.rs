//! Per-producer TTL cache with single-flight refresh.
//!
//! Each source owns exactly one [`TtlCache`]; the cache *is* the slot for that
//! source's last successful value. Caches are constructed explicitly and handed to
//! the assembler, so tests can drive them with a [`ManualClock`](crate::ManualClock).
//!
//! Read path:
//!
//! 1. A value younger than the TTL is returned without any upstream call.
//! 2. Otherwise one caller runs the fetch while concurrent callers wait on the
//!    flight lock; when they wake they take that attempt's outcome (value or error)
//!    instead of fetching again.
//! 3. A failed fetch leaves the previous entry in place but does not serve it,
//!    unless a stale grace window is configured.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::clock::{Clock, SystemClock};
use crate::source::UpstreamError;

/// A value together with the instant it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub computed_at: Instant,
}

impl<T> CacheEntry<T> {
    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.computed_at)
    }
}

#[derive(Debug)]
struct Slot<T> {
    entry: Option<CacheEntry<T>>,
    /// Bumped after every completed fetch, successful or not.
    generation: u64,
    last_failure: Option<UpstreamError>,
}

/// Counters describing how a cache has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads answered from the entry, including callers that waited on another's refresh.
    pub hits: u64,
    /// Reads that ran the fetch themselves.
    pub misses: u64,
    pub fetches: u64,
    pub failures: u64,
    pub stale_served: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
    stale_served: AtomicU64,
}

impl StatCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
        }
    }
}

enum Lookup<T> {
    Fresh(T),
    Miss { generation: u64 },
}

/// Single-slot expiring memo of one producer's last successful value.
#[derive(Debug)]
pub struct TtlCache<T> {
    name: &'static str,
    ttl: Duration,
    stale_grace: Duration,
    clock: Arc<dyn Clock>,
    slot: Mutex<Slot<T>>,
    flight: tokio::sync::Mutex<()>,
    stats: StatCounters,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(name: &'static str, ttl: Duration) -> Self {
        Self::with_clock(name, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            ttl,
            stale_grace: Duration::ZERO,
            clock,
            slot: Mutex::new(Slot {
                entry: None,
                generation: 0,
                last_failure: None,
            }),
            flight: tokio::sync::Mutex::new(()),
            stats: StatCounters::default(),
        }
    }

    /// Allows a failed refresh to serve the previous value while it is younger
    /// than `ttl + grace`. Zero (the default) disables stale serving.
    pub fn with_stale_grace(mut self, grace: Duration) -> Self {
        self.stale_grace = grace;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Returns the cached value when fresh, otherwise runs `fetch` (at most once
    /// across concurrent callers) and stores its result on success.
    ///
    /// # Errors
    ///
    /// Returns the fetch's [`UpstreamError`] when the refresh fails and no stale
    /// grace applies. Waiters that joined an in-flight refresh receive the same
    /// error.
    pub async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<T, UpstreamError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let observed = match self.lookup() {
            Lookup::Fresh(value) => {
                StatCounters::bump(&self.stats.hits);
                debug!(cache = self.name, "cache hit");
                return Ok(value);
            }
            Lookup::Miss { generation } => generation,
        };

        let _flight = self.flight.lock().await;

        if let Some(settled) = self.joined_outcome(observed) {
            return settled;
        }

        debug!(cache = self.name, "cache miss; refreshing");
        StatCounters::bump(&self.stats.misses);
        StatCounters::bump(&self.stats.fetches);
        let outcome = fetch().await;

        let now = self.clock.now();
        let mut slot = self.lock_slot();
        slot.generation = slot.generation.wrapping_add(1);
        match outcome {
            Ok(value) => {
                slot.entry = Some(CacheEntry {
                    value: value.clone(),
                    computed_at: now,
                });
                slot.last_failure = None;
                Ok(value)
            }
            Err(error) => {
                StatCounters::bump(&self.stats.failures);
                slot.last_failure = Some(error.clone());
                self.stale_fallback(&slot, now, error)
            }
        }
    }

    /// Last stored entry regardless of age.
    pub fn peek(&self) -> Option<CacheEntry<T>> {
        self.lock_slot().entry.clone()
    }

    /// Age of the stored entry, if any.
    pub fn age(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.lock_slot().entry.as_ref().map(|entry| entry.age(now))
    }

    /// Drops the stored entry so the next read refreshes.
    pub fn invalidate(&self) {
        let mut slot = self.lock_slot();
        slot.entry = None;
        slot.last_failure = None;
    }

    fn lookup(&self) -> Lookup<T> {
        let now = self.clock.now();
        let slot = self.lock_slot();
        match &slot.entry {
            Some(entry) if entry.age(now) < self.ttl => Lookup::Fresh(entry.value.clone()),
            _ => Lookup::Miss {
                generation: slot.generation,
            },
        }
    }

    /// Outcome of a refresh that completed while this caller waited for the flight
    /// lock, if there was one.
    fn joined_outcome(&self, observed: u64) -> Option<Result<T, UpstreamError>> {
        let now = self.clock.now();
        let slot = self.lock_slot();
        if slot.generation == observed {
            return None;
        }

        if let Some(error) = &slot.last_failure {
            return Some(self.stale_fallback(&slot, now, error.clone()));
        }
        match &slot.entry {
            Some(entry) if entry.age(now) < self.ttl => {
                StatCounters::bump(&self.stats.hits);
                Some(Ok(entry.value.clone()))
            }
            _ => None,
        }
    }

    fn stale_fallback(
        &self,
        slot: &Slot<T>,
        now: Instant,
        error: UpstreamError,
    ) -> Result<T, UpstreamError> {
        if self.stale_grace.is_zero() {
            return Err(error);
        }

        match &slot.entry {
            Some(entry) if entry.age(now) < self.ttl + self.stale_grace => {
                StatCounters::bump(&self.stats.stale_served);
                warn!(
                    cache = self.name,
                    age_secs = entry.age(now).as_secs(),
                    error = %error,
                    "refresh failed; serving stale value within grace window"
                );
                Ok(entry.value.clone())
            }
            _ => Err(error),
        }
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
