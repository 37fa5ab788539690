use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::{chain_builder, coordinate, lenient_f64, number_from_json, Upstream};
use crate::chain::StrategyChain;
use crate::clock::Clock;
use crate::config::{Coordinates, DigestConfig};
use crate::source::{FetchFuture, SourceId, Strategy, UpstreamError};

pub const OPEN_METEO_MARINE_URL: &str = "https://marine-api.open-meteo.com/v1/marine";

/// Sea surface temperature chain: marine `current`, then the first `hourly` value.
pub fn sea_chain(upstream: &Upstream, config: &DigestConfig, clock: Arc<dyn Clock>) -> StrategyChain<f64> {
    let timezone = config.timezone.name();
    chain_builder(SourceId::Sea, config, clock)
        .then(MarineCurrent::new(upstream.clone(), config.coordinates, timezone))
        .then(MarineHourly::new(upstream.clone(), config.coordinates, timezone))
        .build()
}

fn marine_url(at: Coordinates, timezone: &str, selector: &str) -> String {
    format!(
        "{OPEN_METEO_MARINE_URL}?latitude={}&longitude={}&{selector}&timezone={}",
        coordinate(at.latitude),
        coordinate(at.longitude),
        urlencoding::encode(timezone),
    )
}

/// Open-Meteo marine `current.sea_surface_temperature`.
#[derive(Debug, Clone)]
pub struct MarineCurrent {
    upstream: Upstream,
    url: String,
}

impl MarineCurrent {
    pub fn new(upstream: Upstream, at: Coordinates, timezone: &str) -> Self {
        Self {
            upstream,
            url: marine_url(at, timezone, "current=sea_surface_temperature"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarineCurrentBody {
    #[serde(default)]
    current: Option<MarineCurrentBlock>,
}

#[derive(Debug, Deserialize)]
struct MarineCurrentBlock {
    #[serde(default, deserialize_with = "lenient_f64")]
    sea_surface_temperature: Option<f64>,
}

impl Strategy<f64> for MarineCurrent {
    fn name(&self) -> &'static str {
        "open_meteo_marine_current"
    }

    fn fetch(&self) -> FetchFuture<'_, f64> {
        Box::pin(async move {
            let body: MarineCurrentBody = self.upstream.get_json(&self.url).await?;
            body.current
                .and_then(|current| current.sea_surface_temperature)
                .ok_or_else(|| UpstreamError::missing_data("marine current has no sea_surface_temperature"))
        })
    }
}

/// Open-Meteo marine hourly series, starting at the current hour.
#[derive(Debug, Clone)]
pub struct MarineHourly {
    upstream: Upstream,
    url: String,
}

impl MarineHourly {
    pub fn new(upstream: Upstream, at: Coordinates, timezone: &str) -> Self {
        Self {
            upstream,
            url: marine_url(
                at,
                timezone,
                "hourly=sea_surface_temperature&forecast_hours=1",
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MarineHourlyBody {
    #[serde(default)]
    hourly: Option<MarineHourlyBlock>,
}

#[derive(Debug, Deserialize)]
struct MarineHourlyBlock {
    #[serde(default)]
    sea_surface_temperature: Vec<Value>,
}

impl Strategy<f64> for MarineHourly {
    fn name(&self) -> &'static str {
        "open_meteo_marine_hourly"
    }

    fn fetch(&self) -> FetchFuture<'_, f64> {
        Box::pin(async move {
            let body: MarineHourlyBody = self.upstream.get_json(&self.url).await?;
            body.hourly
                .and_then(|hourly| hourly.sea_surface_temperature.first().and_then(number_from_json))
                .ok_or_else(|| UpstreamError::missing_data("marine hourly series has no first value"))
        })
    }
}
