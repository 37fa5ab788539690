use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::clock::{Clock, SystemClock};
use crate::http_client::DEFAULT_TIMEOUT;
use crate::source::{SourceId, Strategy, UpstreamError};
use crate::throttling::RateBudget;

/// One failed strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptError {
    pub strategy: &'static str,
    pub error: UpstreamError,
}

/// Successful chain run.
#[derive(Debug, Clone)]
pub struct ChainSuccess<T> {
    pub data: T,
    /// First strategy that contributed to `data`.
    pub selected: &'static str,
    /// Every strategy whose result went into `data`, in order.
    pub contributed: Vec<&'static str>,
    pub attempted: Vec<&'static str>,
    pub errors: Vec<AttemptError>,
    pub latency_ms: u64,
}

/// Chain run in which every strategy failed.
#[derive(Debug, Clone)]
pub struct ChainFailure {
    pub source: SourceId,
    pub attempted: Vec<&'static str>,
    pub errors: Vec<AttemptError>,
    pub latency_ms: u64,
}

impl ChainFailure {
    pub fn into_error(self) -> UpstreamError {
        UpstreamError::exhausted(self.source, self.attempted.len())
    }
}

pub type ChainResult<T> = Result<ChainSuccess<T>, ChainFailure>;

/// A value that later strategies may complete piece by piece.
///
/// Chains built with [`StrategyChainBuilder::fill_gaps`] keep running after a
/// success until the value is complete, merging each later result into it.
pub trait Fillable {
    fn is_complete(&self) -> bool;

    /// Takes from `other` whatever `self` is still missing.
    fn fill_from(&mut self, other: Self);
}

struct GapFiller<T> {
    is_complete: fn(&T) -> bool,
    fill_from: fn(&mut T, T),
}

/// Strategy name and breaker state, for reports.
#[derive(Debug, Clone, Serialize)]
pub struct LinkSnapshot {
    pub strategy: &'static str,
    pub circuit: &'static str,
    pub rate_limit_per_window: Option<u32>,
}

struct ChainLink<T> {
    strategy: Arc<dyn Strategy<T>>,
    breaker: CircuitBreaker,
    budget: Option<RateBudget>,
}

/// Ordered fallback list of strategies for one source.
///
/// [`run`](StrategyChain::run) tries each strategy in turn and returns the first
/// success; later strategies are never called once one succeeds. Each attempt is
/// bounded by the chain's call timeout, and a timeout is handled like any other
/// failure.
pub struct StrategyChain<T> {
    source: SourceId,
    links: Vec<ChainLink<T>>,
    call_timeout: Duration,
    gap_filler: Option<GapFiller<T>>,
}

impl<T> std::fmt::Debug for StrategyChain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyChain")
            .field("source", &self.source)
            .field("strategies", &self.strategy_names())
            .field("call_timeout", &self.call_timeout)
            .field("fills_gaps", &self.gap_filler.is_some())
            .finish()
    }
}

impl<T> StrategyChain<T> {
    pub const fn source(&self) -> SourceId {
        self.source
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.links.iter().map(|link| link.strategy.name()).collect()
    }
}

impl<T: Send> StrategyChain<T> {
    pub fn builder(source: SourceId) -> StrategyChainBuilder<T> {
        StrategyChainBuilder::new(source)
    }

    pub fn snapshot(&self) -> Vec<LinkSnapshot> {
        self.links
            .iter()
            .map(|link| LinkSnapshot {
                strategy: link.strategy.name(),
                circuit: link.breaker.state().as_str(),
                rate_limit_per_window: link.budget.as_ref().map(RateBudget::limit),
            })
            .collect()
    }

    pub fn circuit_state(&self, strategy: &str) -> Option<CircuitState> {
        self.links
            .iter()
            .find(|link| link.strategy.name() == strategy)
            .map(|link| link.breaker.state())
    }

    pub async fn run(&self) -> ChainResult<T> {
        let started = Instant::now();
        let mut attempted = Vec::with_capacity(self.links.len());
        let mut errors = Vec::new();
        let mut partial: Option<(T, Vec<&'static str>)> = None;

        for link in &self.links {
            let name = link.strategy.name();
            attempted.push(name);

            match self.attempt(link).await {
                Ok(data) => {
                    let (data, contributed) = match (partial.take(), &self.gap_filler) {
                        (Some((mut merged, mut contributed)), Some(filler)) => {
                            (filler.fill_from)(&mut merged, data);
                            contributed.push(name);
                            (merged, contributed)
                        }
                        _ => (data, vec![name]),
                    };

                    let complete = self
                        .gap_filler
                        .as_ref()
                        .map_or(true, |filler| (filler.is_complete)(&data));
                    if !complete {
                        debug!(
                            source = %self.source,
                            strategy = name,
                            "partial result; asking next strategy for the gaps"
                        );
                        partial = Some((data, contributed));
                        continue;
                    }
                    return Ok(self.succeed(data, contributed, attempted, errors, started));
                }
                Err(error) => {
                    warn!(source = %self.source, strategy = name, error = %error, "strategy failed");
                    errors.push(AttemptError {
                        strategy: name,
                        error,
                    });
                }
            }
        }

        if let Some((data, contributed)) = partial {
            warn!(
                source = %self.source,
                contributed = ?contributed,
                "no strategy completed the value; returning partial result"
            );
            return Ok(self.succeed(data, contributed, attempted, errors, started));
        }

        warn!(
            source = %self.source,
            attempts = attempted.len(),
            "all strategies failed"
        );
        Err(ChainFailure {
            source: self.source,
            attempted,
            errors,
            latency_ms: elapsed_ms(started),
        })
    }

    fn succeed(
        &self,
        data: T,
        contributed: Vec<&'static str>,
        attempted: Vec<&'static str>,
        errors: Vec<AttemptError>,
        started: Instant,
    ) -> ChainSuccess<T> {
        let selected = contributed.first().copied().unwrap_or_default();
        if !errors.is_empty() {
            warn!(
                source = %self.source,
                strategy = selected,
                failed_attempts = errors.len(),
                "fallback strategy succeeded"
            );
        }
        ChainSuccess {
            data,
            selected,
            contributed,
            attempted,
            errors,
            latency_ms: elapsed_ms(started),
        }
    }

    /// Runs the chain and collapses the outcome into the cache's result type.
    pub async fn fetch(&self) -> Result<T, UpstreamError> {
        self.run()
            .await
            .map(|success| success.data)
            .map_err(ChainFailure::into_error)
    }

    async fn attempt(&self, link: &ChainLink<T>) -> Result<T, UpstreamError> {
        let name = link.strategy.name();
        if !link.breaker.allow_request() {
            return Err(UpstreamError::circuit_open(name));
        }
        if let Some(budget) = &link.budget {
            if !budget.try_acquire() {
                return Err(UpstreamError::rate_limited(name));
            }
        }

        debug!(source = %self.source, strategy = name, "calling upstream");
        let outcome = match tokio::time::timeout(self.call_timeout, link.strategy.fetch()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(UpstreamError::timeout(format!(
                "'{name}' did not answer within {} ms",
                self.call_timeout.as_millis()
            ))),
        };

        match &outcome {
            Ok(_) => link.breaker.record_success(),
            Err(error) if error.counts_as_upstream_failure() => {
                if link.breaker.record_failure() {
                    warn!(source = %self.source, strategy = name, "circuit breaker opened");
                }
            }
            Err(_) => {}
        }
        outcome
    }
}

/// Builder for [`StrategyChain`].
pub struct StrategyChainBuilder<T> {
    source: SourceId,
    links: Vec<ChainLink<T>>,
    gap_filler: Option<GapFiller<T>>,
    call_timeout: Duration,
    breaker_config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
}

impl<T: Send> StrategyChainBuilder<T> {
    fn new(source: SourceId) -> Self {
        Self {
            source,
            links: Vec::new(),
            gap_filler: None,
            call_timeout: DEFAULT_TIMEOUT,
            breaker_config: CircuitBreakerConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Breaker settings for strategies added after this call.
    pub fn breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = config;
        self
    }

    /// Clock for breakers of strategies added after this call.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Keeps asking later strategies until the value is complete.
    pub fn fill_gaps(mut self) -> Self
    where
        T: Fillable,
    {
        self.gap_filler = Some(GapFiller {
            is_complete: T::is_complete,
            fill_from: T::fill_from,
        });
        self
    }

    pub fn then(self, strategy: impl Strategy<T> + 'static) -> Self {
        self.push(Arc::new(strategy), None)
    }

    pub fn then_budgeted(self, strategy: impl Strategy<T> + 'static, budget: RateBudget) -> Self {
        self.push(Arc::new(strategy), Some(budget))
    }

    fn push(mut self, strategy: Arc<dyn Strategy<T>>, budget: Option<RateBudget>) -> Self {
        self.links.push(ChainLink {
            strategy,
            breaker: CircuitBreaker::new(self.breaker_config, self.clock.clone()),
            budget,
        });
        self
    }

    pub fn build(self) -> StrategyChain<T> {
        StrategyChain {
            source: self.source,
            links: self.links,
            call_timeout: self.call_timeout,
            gap_filler: self.gap_filler,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::source::{FetchFuture, UpstreamErrorKind};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        name: &'static str,
        outcome: Result<f64, UpstreamError>,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn ok(name: &'static str, value: f64) -> (Self, Arc<AtomicUsize>) {
            Self::with(name, Ok(value), Duration::ZERO)
        }

        fn err(name: &'static str) -> (Self, Arc<AtomicUsize>) {
            Self::with(name, Err(UpstreamError::status(500)), Duration::ZERO)
        }

        fn with(
            name: &'static str,
            outcome: Result<f64, UpstreamError>,
            delay: Duration,
        ) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    name,
                    outcome,
                    delay,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl Strategy<f64> for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        fn fetch(&self) -> FetchFuture<'_, f64> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }
                self.outcome.clone()
            })
        }
    }

    #[tokio::test]
    async fn second_strategy_wins_and_third_is_never_called() {
        let (first, first_calls) = Scripted::err("first");
        let (second, second_calls) = Scripted::ok("second", 42.0);
        let (third, third_calls) = Scripted::ok("third", 7.0);
        let chain = StrategyChain::builder(SourceId::Crypto)
            .then(first)
            .then(second)
            .then(third)
            .build();

        let success = chain.run().await.expect("second strategy succeeds");

        assert_eq!(success.data, 42.0);
        assert_eq!(success.selected, "second");
        assert_eq!(success.attempted, vec!["first", "second"]);
        assert_eq!(success.errors.len(), 1);
        assert_eq!(success.errors[0].strategy, "first");
        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_chain_reports_every_attempt_in_order() {
        let (first, _) = Scripted::err("first");
        let (second, _) = Scripted::err("second");
        let chain = StrategyChain::builder(SourceId::Metal)
            .then(first)
            .then(second)
            .build();

        let failure = chain.run().await.expect_err("nothing succeeds");
        assert_eq!(failure.attempted, vec!["first", "second"]);
        assert_eq!(failure.errors.len(), 2);

        let error = failure.into_error();
        assert_eq!(error.kind(), UpstreamErrorKind::Exhausted);
        assert!(error.message().contains("metal"));
    }

    #[tokio::test]
    async fn slow_strategy_times_out_and_chain_moves_on() {
        let (slow, _) = Scripted::with("slow", Ok(1.0), Duration::from_millis(200));
        let (fast, _) = Scripted::ok("fast", 2.0);
        let chain = StrategyChain::builder(SourceId::Sea)
            .call_timeout(Duration::from_millis(20))
            .then(slow)
            .then(fast)
            .build();

        let success = chain.run().await.expect("fast strategy answers");
        assert_eq!(success.data, 2.0);
        assert_eq!(success.errors[0].error.kind(), UpstreamErrorKind::Timeout);
    }

    #[tokio::test]
    async fn open_breaker_skips_strategy_without_calling_it() {
        let clock = Arc::new(ManualClock::new());
        let (flaky, flaky_calls) = Scripted::err("flaky");
        let (backup, _) = Scripted::ok("backup", 5.0);
        let chain = StrategyChain::builder(SourceId::Weather)
            .clock(clock.clone())
            .breaker(CircuitBreakerConfig {
                failure_threshold: 2,
                open_timeout: Duration::from_secs(30),
            })
            .then(flaky)
            .then(backup)
            .build();

        for _ in 0..3 {
            chain.run().await.expect("backup answers");
        }

        assert_eq!(flaky_calls.load(Ordering::SeqCst), 2);
        assert_eq!(chain.circuit_state("flaky"), Some(CircuitState::Open));

        clock.advance(Duration::from_secs(30));
        chain.run().await.expect("backup answers");
        assert_eq!(flaky_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_rate_budget_skips_strategy() {
        let (limited, limited_calls) = Scripted::ok("limited", 1.0);
        let (backup, _) = Scripted::ok("backup", 2.0);
        let chain = StrategyChain::builder(SourceId::Crypto)
            .then_budgeted(limited, RateBudget::per_minute(1))
            .then(backup)
            .build();

        assert_eq!(chain.fetch().await, Ok(1.0));
        assert_eq!(chain.fetch().await, Ok(2.0));
        assert_eq!(limited_calls.load(Ordering::SeqCst), 1);
        assert_eq!(chain.circuit_state("limited"), Some(CircuitState::Closed));
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    struct Pair(Option<f64>, Option<f64>);

    impl Fillable for Pair {
        fn is_complete(&self) -> bool {
            self.0.is_some() && self.1.is_some()
        }

        fn fill_from(&mut self, other: Self) {
            self.0 = self.0.or(other.0);
            self.1 = self.1.or(other.1);
        }
    }

    struct FixedPair {
        name: &'static str,
        value: Pair,
        calls: Arc<AtomicUsize>,
    }

    impl Strategy<Pair> for FixedPair {
        fn name(&self) -> &'static str {
            self.name
        }

        fn fetch(&self) -> FetchFuture<'_, Pair> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move { Ok(self.value) })
        }
    }

    fn fixed_pair(name: &'static str, value: Pair) -> (FixedPair, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            FixedPair {
                name,
                value,
                calls: calls.clone(),
            },
            calls,
        )
    }

    #[tokio::test]
    async fn gap_filling_chain_stops_once_value_is_complete() {
        let (first, _) = fixed_pair("first", Pair(Some(1.0), None));
        let (second, _) = fixed_pair("second", Pair(Some(9.0), Some(2.0)));
        let (third, third_calls) = fixed_pair("third", Pair(Some(7.0), Some(7.0)));
        let chain = StrategyChain::builder(SourceId::Crypto)
            .fill_gaps()
            .then(first)
            .then(second)
            .then(third)
            .build();

        let success = chain.run().await.expect("value completed");

        assert_eq!(success.data, Pair(Some(1.0), Some(2.0)));
        assert_eq!(success.selected, "first");
        assert_eq!(success.contributed, vec!["first", "second"]);
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn gap_filling_chain_returns_partial_value_when_list_runs_out() {
        let (first, _) = fixed_pair("first", Pair(None, Some(3.0)));
        let (second, _) = fixed_pair("second", Pair(None, None));
        let chain = StrategyChain::builder(SourceId::Crypto)
            .fill_gaps()
            .then(first)
            .then(second)
            .build();

        let success = chain.run().await.expect("partial value survives");

        assert_eq!(success.data, Pair(None, Some(3.0)));
        assert_eq!(success.attempted, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn plain_chain_returns_first_partial_value() {
        let (first, _) = fixed_pair("first", Pair(Some(1.0), None));
        let (second, second_calls) = fixed_pair("second", Pair(Some(2.0), Some(2.0)));
        let chain = StrategyChain::builder(SourceId::Crypto)
            .then(first)
            .then(second)
            .build();

        let success = chain.run().await.expect("first answers");

        assert_eq!(success.data, Pair(Some(1.0), None));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn debug_output_lists_strategies_and_gap_filling() {
        let (first, _) = Scripted::ok("first", 1.0);
        let (second, _) = Scripted::ok("second", 2.0);
        let chain = StrategyChain::builder(SourceId::Sea).then(first).then(second).build();

        let rendered = format!("{chain:?}");

        assert!(rendered.contains(r#"strategies: ["first", "second"]"#));
        assert!(rendered.contains("fills_gaps: false"));
    }
}
