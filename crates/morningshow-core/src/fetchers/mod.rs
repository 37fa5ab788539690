//! Upstream strategies for every source, and the chains that order them.
//!
//! | Source | Strategies, in order |
//! |--------|----------------------|
//! | weather | `open_meteo_current` → `met_norway_compact` |
//! | sea | `open_meteo_marine_current` → `open_meteo_marine_hourly` |
//! | crypto | `coingecko_simple_price` → `coinbase_spot` → `coinbase_rates_inverse` |
//! | metal | `exchangerate_host_direct` → `gold_api_spot` → `exchangerate_host_inverse` |
//!
//! Every payload is parsed leniently: numbers may arrive as JSON numbers or as
//! numeric strings, and anything else counts as absent.

pub mod crypto;
pub mod metal;
pub mod sea;
pub mod weather;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::chain::StrategyChainBuilder;
use crate::clock::Clock;
use crate::config::DigestConfig;
use crate::domain::PriceQuote;
use crate::format::parse_number;
use crate::http_client::{HttpClient, HttpRequest};
use crate::source::{SourceId, UpstreamError};

pub use crypto::crypto_chain;
pub use metal::metal_chain;
pub use sea::sea_chain;
pub use weather::weather_chain;

/// Transport and timeout shared by the strategies of one process.
#[derive(Clone)]
pub struct Upstream {
    http: Arc<dyn HttpClient>,
    timeout: Duration,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Upstream {
    pub fn new(http: Arc<dyn HttpClient>, timeout: Duration) -> Self {
        Self { http, timeout }
    }

    /// GETs `url` and decodes a JSON body.
    ///
    /// # Errors
    ///
    /// Transport failures, non-2xx statuses and undecodable bodies.
    pub async fn get_json<D: DeserializeOwned>(&self, url: &str) -> Result<D, UpstreamError> {
        let request = HttpRequest::get(url)
            .with_header("accept", "application/json")
            .with_timeout(self.timeout);
        let response = self.http.execute(request).await?;

        if !response.is_success() {
            return Err(UpstreamError::status(response.status));
        }

        serde_json::from_str(&response.body)
            .map_err(|e| UpstreamError::malformed(format!("failed to decode {url}: {e}")))
    }
}

/// Starts a chain carrying the configured timeout and breaker settings.
pub(crate) fn chain_builder<T: Send>(
    source: SourceId,
    config: &DigestConfig,
    clock: Arc<dyn Clock>,
) -> StrategyChainBuilder<T> {
    crate::chain::StrategyChain::builder(source)
        .call_timeout(config.upstream_timeout)
        .breaker(config.breaker)
        .clock(clock)
}

/// Reads a JSON number or numeric string; anything else, or a non-finite value,
/// is `None`.
pub fn number_from_json(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64().filter(|number| number.is_finite()),
        Value::String(raw) => parse_number(raw).ok(),
        _ => None,
    }
}

/// `deserialize_with` adapter for optional lenient numbers.
pub(crate) fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_json))
}

/// Prices of zero or below carry no information.
pub fn positive_price(value: Option<f64>) -> Option<f64> {
    value.filter(|price| price.is_finite() && *price > 0.0)
}

/// Converts a USD→asset rate into an asset→USD price.
pub fn invert_rate(rate: Option<f64>) -> Option<f64> {
    positive_price(rate)
        .map(|rate| 1.0 / rate)
        .filter(|price| price.is_finite())
}

/// A price strategy succeeds as long as one requested asset has a value.
pub(crate) fn require_any_price(
    strategy: &str,
    quotes: Vec<PriceQuote>,
) -> Result<Vec<PriceQuote>, UpstreamError> {
    if quotes.iter().any(|quote| quote.usd_value.is_some()) {
        Ok(quotes)
    } else {
        Err(UpstreamError::missing_data(format!(
            "'{strategy}' returned no usable price"
        )))
    }
}

/// Coordinates as sent to upstreams: four decimals, about eleven metres.
pub(crate) fn coordinate(value: f64) -> String {
    format!("{value:.4}")
}
