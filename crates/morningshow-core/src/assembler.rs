//! Digest assembly: every source through its cache, concurrently, then render.
//!
//! A failing source only blanks its own fields. Nothing here returns an error to
//! the caller; the digest is always produced.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::cache::{CacheStats, TtlCache};
use crate::chain::{LinkSnapshot, StrategyChain};
use crate::clock::Clock;
use crate::config::DigestConfig;
use crate::domain::{Asset, Digest, DigestInput, PriceQuote, WeatherSample};
use crate::fetchers::crypto::CRYPTO_ASSETS;
use crate::fetchers::{crypto_chain, metal_chain, sea_chain, weather_chain, Upstream};
use crate::http_client::HttpClient;
use crate::quotes::QuoteBook;
use crate::render::render_digest;
use crate::source::{SourceId, UpstreamError};

/// A source's fallback chain behind its TTL cache.
#[derive(Debug)]
pub struct CachedSource<T> {
    chain: StrategyChain<T>,
    cache: TtlCache<T>,
}

impl<T: Clone + Send> CachedSource<T> {
    pub fn new(chain: StrategyChain<T>, cache: TtlCache<T>) -> Self {
        Self { chain, cache }
    }

    pub fn source(&self) -> SourceId {
        self.chain.source()
    }

    /// Cached value, or one chain run on a miss.
    ///
    /// # Errors
    ///
    /// The chain's exhaustion error when every strategy failed and no stale grace
    /// applies.
    pub async fn get(&self) -> Result<T, UpstreamError> {
        self.cache.get_or_fetch(|| self.chain.fetch()).await
    }

    pub fn chain(&self) -> &StrategyChain<T> {
        &self.chain
    }

    pub fn cache(&self) -> &TtlCache<T> {
        &self.cache
    }

    pub fn report(&self) -> SourceReport {
        SourceReport {
            source: self.source(),
            ttl_secs: self.cache.ttl().as_secs(),
            strategies: self.chain.snapshot(),
            cache: self.cache.stats(),
            cached_age_secs: self.cache.age().map(|age| age.as_secs()),
        }
    }
}

/// Operational view of one source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: SourceId,
    pub ttl_secs: u64,
    pub strategies: Vec<LinkSnapshot>,
    pub cache: CacheStats,
    pub cached_age_secs: Option<u64>,
}

/// The four cached sources of a process.
#[derive(Debug)]
pub struct DigestSources {
    pub weather: CachedSource<WeatherSample>,
    pub sea: CachedSource<f64>,
    pub crypto: CachedSource<Vec<PriceQuote>>,
    pub metal: CachedSource<PriceQuote>,
}

impl DigestSources {
    /// Wires every chain and cache from `config`; caches and breakers share `clock`.
    pub fn from_config(config: &DigestConfig, http: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        let upstream = Upstream::new(http, config.upstream_timeout);

        Self {
            weather: CachedSource::new(
                weather_chain(&upstream, config, clock.clone()),
                source_cache(SourceId::Weather, config, &clock),
            ),
            sea: CachedSource::new(
                sea_chain(&upstream, config, clock.clone()),
                source_cache(SourceId::Sea, config, &clock),
            ),
            crypto: CachedSource::new(
                crypto_chain(&upstream, config, clock.clone()),
                source_cache(SourceId::Crypto, config, &clock),
            ),
            metal: CachedSource::new(
                metal_chain(&upstream, config, clock.clone()),
                source_cache(SourceId::Metal, config, &clock),
            ),
        }
    }

    pub fn reports(&self) -> Vec<SourceReport> {
        vec![
            self.weather.report(),
            self.sea.report(),
            self.crypto.report(),
            self.metal.report(),
        ]
    }
}

fn source_cache<T: Clone>(source: SourceId, config: &DigestConfig, clock: &Arc<dyn Clock>) -> TtlCache<T> {
    TtlCache::with_clock(source.as_str(), config.ttls.for_source(source), clock.clone())
        .with_stale_grace(config.stale_grace)
}

/// Builds digests from shared sources.
#[derive(Debug, Clone)]
pub struct DigestAssembler {
    sources: Arc<DigestSources>,
    quotes: QuoteBook,
    timezone: Tz,
    location_label: String,
}

impl DigestAssembler {
    pub fn new(sources: Arc<DigestSources>, quotes: QuoteBook, config: &DigestConfig) -> Self {
        Self {
            sources,
            quotes,
            timezone: config.timezone,
            location_label: config.location_label.clone(),
        }
    }

    pub fn from_config(config: &DigestConfig, http: Arc<dyn HttpClient>, clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(DigestSources::from_config(config, http, clock)),
            QuoteBook::default(),
            config,
        )
    }

    pub fn sources(&self) -> &Arc<DigestSources> {
        &self.sources
    }

    pub fn quote_book(&self) -> &QuoteBook {
        &self.quotes
    }

    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Calendar date of `now` in the configured zone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Quote of the day for `now` in the configured zone.
    pub fn quote_for(&self, now: DateTime<Utc>) -> &str {
        self.quotes.quote_for(self.local_date(now))
    }

    /// Fetches all four sources concurrently and collects whatever succeeded.
    pub async fn gather(&self, date: NaiveDate) -> DigestInput {
        let (weather, sea, crypto, metal) = tokio::join!(
            self.sources.weather.get(),
            self.sources.sea.get(),
            self.sources.crypto.get(),
            self.sources.metal.get(),
        );

        let mut prices = settle(SourceId::Crypto, crypto).unwrap_or_else(|| {
            CRYPTO_ASSETS.iter().copied().map(PriceQuote::missing).collect()
        });
        prices.push(settle(SourceId::Metal, metal).unwrap_or(PriceQuote::missing(Asset::Xau)));

        DigestInput {
            weather: settle(SourceId::Weather, weather).unwrap_or_default(),
            sea_temp_c: settle(SourceId::Sea, sea),
            prices,
            quote: Some(self.quotes.quote_for(date).to_owned()),
        }
    }

    /// Produces the digest for `now`, converted to the configured zone.
    pub async fn build_digest(&self, now: DateTime<Utc>) -> Digest {
        let started = Instant::now();
        let date = self.local_date(now);
        let input = self.gather(date).await;
        let digest = render_digest(&input, date, &self.location_label);

        info!(
            date = %date,
            fields_present = input.present_fields(),
            fields_total = DIGEST_VALUE_FIELDS,
            latency_ms = started.elapsed().as_millis() as u64,
            "digest built"
        );
        digest
    }
}

/// Weather (4), sea (1) and prices (3).
const DIGEST_VALUE_FIELDS: usize = 8;

fn settle<T>(source: SourceId, outcome: Result<T, UpstreamError>) -> Option<T> {
    match outcome {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(source = %source, error = %error, "source unavailable; rendering placeholders");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::http_client::{MockHttpClient, OfflineHttpClient};
    use chrono::TimeZone;

    #[tokio::test]
    async fn offline_digest_is_all_placeholders_with_header_and_quote() {
        let config = DigestConfig::default();
        let assembler = DigestAssembler::from_config(
            &config,
            Arc::new(OfflineHttpClient),
            Arc::new(ManualClock::new()),
        );
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 5, 0, 0).single().expect("valid instant");

        let digest = assembler.build_digest(now).await;

        assert!(digest.text.starts_with("Понедельник, 03.06.2024\n"));
        assert!(digest.text.contains("воздух —, вода —"));
        assert!(digest.text.contains(&format!("Цитата дня: {}", assembler.quote_for(now))));
    }

    #[test]
    fn local_date_uses_configured_zone() {
        let config = DigestConfig::default();
        let assembler = DigestAssembler::from_config(
            &config,
            Arc::new(MockHttpClient::new()),
            Arc::new(ManualClock::new()),
        );
        // 22:30 UTC on Sunday is already Monday in Doha (UTC+3).
        let now = Utc.with_ymd_and_hms(2024, 6, 2, 22, 30, 0).single().expect("valid instant");

        assert_eq!(
            assembler.local_date(now),
            NaiveDate::from_ymd_opt(2024, 6, 3).expect("valid date")
        );
    }

    #[test]
    fn reports_list_every_source_in_order() {
        let assembler = DigestAssembler::from_config(
            &DigestConfig::default(),
            Arc::new(OfflineHttpClient),
            Arc::new(ManualClock::new()),
        );
        let reports = assembler.sources().reports();

        let sources: Vec<SourceId> = reports.iter().map(|report| report.source).collect();
        assert_eq!(sources, SourceId::ALL.to_vec());
        assert_eq!(reports[2].strategies[0].strategy, "coingecko_simple_price");
        assert_eq!(reports[2].strategies[0].rate_limit_per_window, Some(10));
        assert_eq!(reports[0].ttl_secs, 600);
    }
}
