use std::sync::Arc;

use serde::Deserialize;

use super::{chain_builder, invert_rate, lenient_f64, positive_price, Upstream};
use crate::chain::StrategyChain;
use crate::clock::Clock;
use crate::config::DigestConfig;
use crate::domain::{Asset, PriceQuote};
use crate::source::{FetchFuture, SourceId, Strategy, UpstreamError};

pub const EXCHANGERATE_HOST_CONVERT_URL: &str = "https://api.exchangerate.host/convert";
pub const GOLD_API_PRICE_URL: &str = "https://api.gold-api.com/price";

/// Gold chain: direct XAU→USD conversion, gold-api spot, then inverted USD→XAU.
pub fn metal_chain(
    upstream: &Upstream,
    config: &DigestConfig,
    clock: Arc<dyn Clock>,
) -> StrategyChain<PriceQuote> {
    chain_builder(SourceId::Metal, config, clock)
        .then(ExchangeRateConvert::direct(upstream.clone(), Asset::Xau))
        .then(GoldApiSpot::new(upstream.clone(), Asset::Xau))
        .then(ExchangeRateConvert::inverse(upstream.clone(), Asset::Xau))
        .build()
}

fn require_price(strategy: &str, quote: PriceQuote) -> Result<PriceQuote, UpstreamError> {
    if quote.usd_value.is_some() {
        Ok(quote)
    } else {
        Err(UpstreamError::missing_data(format!(
            "'{strategy}' returned no usable {} price",
            quote.asset
        )))
    }
}

/// exchangerate.host `convert`, either asset→USD or USD→asset inverted.
#[derive(Debug, Clone)]
pub struct ExchangeRateConvert {
    upstream: Upstream,
    asset: Asset,
    inverse: bool,
    url: String,
}

impl ExchangeRateConvert {
    pub fn direct(upstream: Upstream, asset: Asset) -> Self {
        Self::new(upstream, asset, false)
    }

    pub fn inverse(upstream: Upstream, asset: Asset) -> Self {
        Self::new(upstream, asset, true)
    }

    fn new(upstream: Upstream, asset: Asset, inverse: bool) -> Self {
        let symbol = urlencoding::encode(asset.symbol());
        let (from, to) = if inverse {
            ("USD".into(), symbol)
        } else {
            (symbol, "USD".into())
        };
        Self {
            upstream,
            asset,
            inverse,
            url: format!("{EXCHANGERATE_HOST_CONVERT_URL}?from={from}&to={to}"),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Deserialize)]
struct ConvertBody {
    #[serde(default, deserialize_with = "lenient_f64")]
    result: Option<f64>,
}

impl Strategy<PriceQuote> for ExchangeRateConvert {
    fn name(&self) -> &'static str {
        if self.inverse {
            "exchangerate_host_inverse"
        } else {
            "exchangerate_host_direct"
        }
    }

    fn fetch(&self) -> FetchFuture<'_, PriceQuote> {
        Box::pin(async move {
            let body: ConvertBody = self.upstream.get_json(&self.url).await?;
            let usd_value = if self.inverse {
                invert_rate(body.result)
            } else {
                positive_price(body.result)
            };
            require_price(self.name(), PriceQuote::new(self.asset, usd_value))
        })
    }
}

/// gold-api.com spot price in USD.
#[derive(Debug, Clone)]
pub struct GoldApiSpot {
    upstream: Upstream,
    asset: Asset,
}

impl GoldApiSpot {
    pub fn new(upstream: Upstream, asset: Asset) -> Self {
        Self { upstream, asset }
    }
}

#[derive(Debug, Deserialize)]
struct GoldApiBody {
    #[serde(default, deserialize_with = "lenient_f64")]
    price: Option<f64>,
}

impl Strategy<PriceQuote> for GoldApiSpot {
    fn name(&self) -> &'static str {
        "gold_api_spot"
    }

    fn fetch(&self) -> FetchFuture<'_, PriceQuote> {
        Box::pin(async move {
            let url = format!(
                "{GOLD_API_PRICE_URL}/{}",
                urlencoding::encode(self.asset.symbol())
            );
            let body: GoldApiBody = self.upstream.get_json(&url).await?;
            require_price(
                self.name(),
                PriceQuote::new(self.asset, positive_price(body.price)),
            )
        })
    }
}
