use std::collections::HashMap;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::task::JoinSet;

use super::{
    chain_builder, invert_rate, lenient_f64, number_from_json, positive_price, require_any_price,
    Upstream,
};
use crate::chain::StrategyChain;
use crate::clock::Clock;
use crate::config::DigestConfig;
use crate::domain::{Asset, PriceQuote};
use crate::source::{FetchFuture, SourceId, Strategy, UpstreamError};
use crate::throttling::RateBudget;

pub const COINGECKO_SIMPLE_PRICE_URL: &str = "https://api.coingecko.com/api/v3/simple/price";
pub const COINBASE_PRICES_URL: &str = "https://api.coinbase.com/v2/prices";
pub const COINBASE_EXCHANGE_RATES_URL: &str = "https://api.coinbase.com/v2/exchange-rates";

/// Assets shown on the crypto line.
pub const CRYPTO_ASSETS: [Asset; 2] = [Asset::Btc, Asset::Xrp];

/// Crypto chain: CoinGecko under its request budget, then Coinbase spot, then
/// inverted Coinbase USD rates. Later strategies run until every asset has a price.
pub fn crypto_chain(
    upstream: &Upstream,
    config: &DigestConfig,
    clock: Arc<dyn Clock>,
) -> StrategyChain<Vec<PriceQuote>> {
    chain_builder(SourceId::Crypto, config, clock)
        .fill_gaps()
        .then_budgeted(
            CoinGeckoSimplePrice::new(upstream.clone(), &CRYPTO_ASSETS),
            RateBudget::per_minute(config.coingecko_per_minute),
        )
        .then(CoinbaseSpot::new(upstream.clone(), &CRYPTO_ASSETS))
        .then(CoinbaseRatesInverse::new(upstream.clone(), &CRYPTO_ASSETS))
        .build()
}

/// CoinGecko `simple/price` for every asset in one request.
#[derive(Debug, Clone)]
pub struct CoinGeckoSimplePrice {
    upstream: Upstream,
    assets: Vec<Asset>,
    url: String,
}

impl CoinGeckoSimplePrice {
    pub fn new(upstream: Upstream, assets: &[Asset]) -> Self {
        let ids = assets
            .iter()
            .filter_map(|asset| asset.coingecko_id())
            .map(|id| urlencoding::encode(id).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            upstream,
            assets: assets.to_vec(),
            url: format!("{COINGECKO_SIMPLE_PRICE_URL}?ids={ids}&vs_currencies=usd"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CoinGeckoPrice {
    #[serde(default, deserialize_with = "lenient_f64")]
    usd: Option<f64>,
}

impl Strategy<Vec<PriceQuote>> for CoinGeckoSimplePrice {
    fn name(&self) -> &'static str {
        "coingecko_simple_price"
    }

    fn fetch(&self) -> FetchFuture<'_, Vec<PriceQuote>> {
        Box::pin(async move {
            let body: HashMap<String, CoinGeckoPrice> = self.upstream.get_json(&self.url).await?;
            let quotes = self
                .assets
                .iter()
                .map(|asset| {
                    let usd = asset
                        .coingecko_id()
                        .and_then(|id| body.get(id))
                        .and_then(|price| price.usd);
                    PriceQuote::new(*asset, positive_price(usd))
                })
                .collect();
            require_any_price(self.name(), quotes)
        })
    }
}

/// Coinbase `prices/{ASSET}-USD/spot`, one concurrent request per asset.
#[derive(Debug, Clone)]
pub struct CoinbaseSpot {
    upstream: Upstream,
    assets: Vec<Asset>,
}

impl CoinbaseSpot {
    pub fn new(upstream: Upstream, assets: &[Asset]) -> Self {
        Self {
            upstream,
            assets: assets.to_vec(),
        }
    }

    fn url(asset: Asset) -> String {
        format!(
            "{COINBASE_PRICES_URL}/{}-USD/spot",
            urlencoding::encode(asset.symbol())
        )
    }
}

#[derive(Debug, Deserialize)]
struct CoinbaseEnvelope<D> {
    data: D,
}

#[derive(Debug, Deserialize)]
struct CoinbaseSpotPrice {
    #[serde(default, deserialize_with = "lenient_f64")]
    amount: Option<f64>,
}

impl Strategy<Vec<PriceQuote>> for CoinbaseSpot {
    fn name(&self) -> &'static str {
        "coinbase_spot"
    }

    fn fetch(&self) -> FetchFuture<'_, Vec<PriceQuote>> {
        Box::pin(async move {
            let mut requests = JoinSet::new();
            for (index, asset) in self.assets.iter().copied().enumerate() {
                let upstream = self.upstream.clone();
                let url = Self::url(asset);
                requests.spawn(async move {
                    let fetched: Result<CoinbaseEnvelope<CoinbaseSpotPrice>, UpstreamError> =
                        upstream.get_json(&url).await;
                    (index, fetched.map(|body| positive_price(body.data.amount)))
                });
            }

            let mut quotes: Vec<PriceQuote> =
                self.assets.iter().copied().map(PriceQuote::missing).collect();
            let mut first_error = None;
            while let Some(joined) = requests.join_next().await {
                match joined {
                    Ok((index, Ok(price))) => {
                        if let Some(quote) = quotes.get_mut(index) {
                            quote.usd_value = price;
                        }
                    }
                    Ok((index, Err(error))) => keep_earliest(&mut first_error, index, error),
                    Err(join_error) => keep_earliest(
                        &mut first_error,
                        usize::MAX,
                        UpstreamError::transport(join_error.to_string()),
                    ),
                }
            }
            let first_error = first_error.map(|(_, error)| error);

            match (require_any_price(self.name(), quotes), first_error) {
                (Err(_), Some(error)) => Err(error),
                (outcome, _) => outcome,
            }
        })
    }
}

/// Keeps the error of the lowest-indexed asset so reports do not depend on arrival order.
fn keep_earliest(slot: &mut Option<(usize, UpstreamError)>, index: usize, error: UpstreamError) {
    if slot.as_ref().map_or(true, |(seen, _)| index < *seen) {
        *slot = Some((index, error));
    }
}

/// Coinbase USD exchange rates (`1 USD = r ASSET`), inverted to USD prices.
#[derive(Debug, Clone)]
pub struct CoinbaseRatesInverse {
    upstream: Upstream,
    assets: Vec<Asset>,
}

impl CoinbaseRatesInverse {
    pub fn new(upstream: Upstream, assets: &[Asset]) -> Self {
        Self {
            upstream,
            assets: assets.to_vec(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CoinbaseRates {
    #[serde(default)]
    rates: HashMap<String, Value>,
}

impl Strategy<Vec<PriceQuote>> for CoinbaseRatesInverse {
    fn name(&self) -> &'static str {
        "coinbase_rates_inverse"
    }

    fn fetch(&self) -> FetchFuture<'_, Vec<PriceQuote>> {
        Box::pin(async move {
            let url = format!("{COINBASE_EXCHANGE_RATES_URL}?currency=USD");
            let body: CoinbaseEnvelope<CoinbaseRates> = self.upstream.get_json(&url).await?;
            let quotes = self
                .assets
                .iter()
                .map(|asset| {
                    let rate = body.data.rates.get(asset.symbol()).and_then(number_from_json);
                    PriceQuote::new(*asset, invert_rate(rate))
                })
                .collect();
            require_any_price(self.name(), quotes)
        })
    }
}
