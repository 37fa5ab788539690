//! Behavior-driven tests for the TTL cache
//!
//! These tests verify HOW cached sources decide between serving a stored value
//! and running their upstream chain, including under concurrency.

use morningshow_core::{
    Clock, DigestConfig, DigestSources, ManualClock, MockHttpClient, TtlCache, UpstreamError,
    UpstreamErrorKind,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SEA_CURRENT: &str = "https://marine-api.open-meteo.com/v1/marine";

fn sea_sources(http: &Arc<MockHttpClient>, clock: &Arc<ManualClock>) -> DigestSources {
    let clock: Arc<dyn Clock> = clock.clone();
    DigestSources::from_config(&DigestConfig::default(), http.clone(), clock)
}

// =============================================================================
// TTL: fresh values are served without upstream calls
// =============================================================================

#[tokio::test]
async fn when_value_is_within_ttl_system_does_not_call_upstream_again() {
    // Given: A sea source whose upstream answers
    let http = Arc::new(MockHttpClient::new().json(
        SEA_CURRENT,
        r#"{"current":{"sea_surface_temperature":29.4}}"#,
    ));
    let clock = Arc::new(ManualClock::new());
    let sources = sea_sources(&http, &clock);

    // When: The source is read twice within its 600 s TTL
    let first = sources.sea.get().await.expect("first read fetches");
    clock.advance(Duration::from_secs(599));
    let second = sources.sea.get().await.expect("second read is cached");

    // Then: Exactly one upstream request was made
    assert_eq!(first, 29.4);
    assert_eq!(second, 29.4);
    assert_eq!(http.hits(SEA_CURRENT), 1);
    assert_eq!(sources.sea.cache().stats().hits, 1);
}

#[tokio::test]
async fn when_ttl_has_expired_system_runs_exactly_one_fresh_chain() {
    // Given: A sea source read once
    let http = Arc::new(MockHttpClient::new().json(
        SEA_CURRENT,
        r#"{"current":{"sea_surface_temperature":29.4}}"#,
    ));
    let clock = Arc::new(ManualClock::new());
    let sources = sea_sources(&http, &clock);
    sources.sea.get().await.expect("seed");

    // When: The TTL elapses and the source is read twice more
    clock.advance(Duration::from_secs(600));
    sources.sea.get().await.expect("refresh");
    sources.sea.get().await.expect("cached again");

    // Then: One extra request, only for the first read after expiry
    assert_eq!(http.hits(SEA_CURRENT), 2);
    assert_eq!(sources.sea.cache().stats().fetches, 2);
}

#[tokio::test]
async fn when_refresh_fails_system_keeps_stale_entry_but_reports_failure() {
    // Given: A cache seeded with a value that has since expired
    let clock = Arc::new(ManualClock::new());
    let cache: TtlCache<f64> =
        TtlCache::with_clock("sea", Duration::from_secs(600), clock.clone());
    cache.get_or_fetch(|| async { Ok(28.0) }).await.expect("seed");
    clock.advance(Duration::from_secs(601));

    // When: The refresh fails
    let outcome = cache
        .get_or_fetch(|| async { Err(UpstreamError::status(503)) })
        .await;

    // Then: The caller sees the failure and the old entry is still stored
    assert_eq!(outcome.map_err(|e| e.kind()), Err(UpstreamErrorKind::Status));
    assert_eq!(cache.peek().map(|entry| entry.value), Some(28.0));
    assert_eq!(cache.stats().failures, 1);
}

// =============================================================================
// Single flight: concurrent misses share one upstream attempt
// =============================================================================

#[tokio::test]
async fn when_many_callers_miss_at_once_system_fetches_once_and_shares_value() {
    // Given: An empty cache and a slow upstream
    let cache = Arc::new(TtlCache::<f64>::with_clock(
        "crypto",
        Duration::from_secs(300),
        Arc::new(ManualClock::new()),
    ));
    let calls = Arc::new(AtomicUsize::new(0));

    // When: Eight callers read concurrently
    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_fetch(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(64_000.0)
                })
                .await
        }));
    }

    // Then: One upstream call, and every caller received its value
    for handle in handles {
        assert_eq!(handle.await.expect("task completes"), Ok(64_000.0));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // And: Only the refreshing caller counts as a miss
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 7);
    assert_eq!(stats.fetches, 1);
}

#[tokio::test]
async fn when_shared_attempt_fails_every_waiter_receives_the_error() {
    // Given: An empty cache and a slow, failing upstream
    let cache = Arc::new(TtlCache::<f64>::with_clock(
        "metal",
        Duration::from_secs(600),
        Arc::new(ManualClock::new()),
    ));
    let calls = Arc::new(AtomicUsize::new(0));

    // When: Several callers read concurrently
    let mut handles = Vec::new();
    for _ in 0..4 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_fetch(|| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Err(UpstreamError::timeout("no answer"))
                })
                .await
        }));
    }

    // Then: All of them see the single attempt's timeout
    for handle in handles {
        let outcome = handle.await.expect("task completes");
        assert_eq!(outcome.map_err(|e| e.kind()), Err(UpstreamErrorKind::Timeout));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn when_caller_abandons_refresh_system_leaves_cache_usable() {
    // Given: A cache whose first refresh never completes in time
    let cache: TtlCache<f64> = TtlCache::with_clock(
        "weather",
        Duration::from_secs(600),
        Arc::new(ManualClock::new()),
    );

    // When: The caller drops the pending read
    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        cache.get_or_fetch(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(1.0)
        }),
    )
    .await;
    assert!(abandoned.is_err());

    // Then: Nothing was stored and the next read fetches normally
    assert!(cache.peek().is_none());
    let value = cache
        .get_or_fetch(|| async { Ok(2.0) })
        .await
        .expect("fresh fetch");
    assert_eq!(value, 2.0);
}

// =============================================================================
// Stale grace: opt-in serving of the previous value
// =============================================================================

#[tokio::test]
async fn when_stale_grace_is_configured_system_serves_previous_value_on_failure() {
    // Given: A sea source with a 120 s grace window, seeded once
    let http = Arc::new(MockHttpClient::new().json(
        SEA_CURRENT,
        r#"{"current":{"sea_surface_temperature":29.4}}"#,
    ));
    let clock = Arc::new(ManualClock::new());
    let config = DigestConfig {
        stale_grace: Duration::from_secs(120),
        ..DigestConfig::default()
    };
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let sources = DigestSources::from_config(&config, http.clone(), dyn_clock);
    sources.sea.get().await.expect("seed");

    // When: The value expires and the refresh fails
    clock.advance(Duration::from_secs(650));
    let served = sources
        .sea
        .cache()
        .get_or_fetch(|| async { Err(UpstreamError::status(500)) })
        .await;

    // Then: The previous value is served while inside ttl + grace
    assert_eq!(served, Ok(29.4));
    assert_eq!(sources.sea.cache().stats().stale_served, 1);

    // And: Past the window the failure surfaces
    clock.advance(Duration::from_secs(80));
    let expired = sources
        .sea
        .cache()
        .get_or_fetch(|| async { Err(UpstreamError::status(500)) })
        .await;
    assert!(expired.is_err());
}
