//! Domain values produced by the sources and consumed by the renderer.
//!
//! Every field is independently optional: a missing value is rendered as a
//! placeholder, never as zero.

use serde::Serialize;

use crate::chain::Fillable;

/// Current conditions at the configured coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct WeatherSample {
    pub air_temp_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub precip_mm: Option<f64>,
    pub wind_mps: Option<f64>,
}

impl WeatherSample {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.air_temp_c.is_none()
            && self.humidity_pct.is_none()
            && self.precip_mm.is_none()
            && self.wind_mps.is_none()
    }
}

/// Priced assets shown in the digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Btc,
    Xrp,
    Xau,
}

impl Asset {
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Btc => "BTC",
            Self::Xrp => "XRP",
            Self::Xau => "XAU",
        }
    }

    /// CoinGecko coin id; gold is not listed there.
    pub const fn coingecko_id(self) -> Option<&'static str> {
        match self {
            Self::Btc => Some("bitcoin"),
            Self::Xrp => Some("ripple"),
            Self::Xau => None,
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// USD price of one asset, if any upstream produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceQuote {
    pub asset: Asset,
    pub usd_value: Option<f64>,
}

impl PriceQuote {
    pub const fn new(asset: Asset, usd_value: Option<f64>) -> Self {
        Self { asset, usd_value }
    }

    pub const fn missing(asset: Asset) -> Self {
        Self::new(asset, None)
    }
}

/// A price list is complete when every asset has a value; gaps are filled per
/// asset from later strategies.
impl Fillable for Vec<PriceQuote> {
    fn is_complete(&self) -> bool {
        self.iter().all(|quote| quote.usd_value.is_some())
    }

    fn fill_from(&mut self, other: Self) {
        for quote in self.iter_mut().filter(|quote| quote.usd_value.is_none()) {
            quote.usd_value = other
                .iter()
                .find(|candidate| candidate.asset == quote.asset)
                .and_then(|candidate| candidate.usd_value);
        }
    }
}

/// Everything the renderer needs for one digest.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DigestInput {
    pub weather: WeatherSample,
    pub sea_temp_c: Option<f64>,
    pub prices: Vec<PriceQuote>,
    pub quote: Option<String>,
}

impl DigestInput {
    /// USD value of `asset`; absent when no quote for it was gathered.
    pub fn price(&self, asset: Asset) -> Option<f64> {
        self.prices
            .iter()
            .find(|quote| quote.asset == asset)
            .and_then(|quote| quote.usd_value)
    }

    pub fn present_fields(&self) -> usize {
        let weather = [
            self.weather.air_temp_c,
            self.weather.humidity_pct,
            self.weather.precip_mm,
            self.weather.wind_mps,
        ];
        weather.iter().filter(|value| value.is_some()).count()
            + usize::from(self.sea_temp_c.is_some())
            + [Asset::Btc, Asset::Xrp, Asset::Xau]
                .into_iter()
                .filter(|asset| self.price(*asset).is_some())
                .count()
    }
}

/// Rendered digest: display text and a speech variant, both at most 1024 chars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub text: String,
    pub speech_text: String,
}
