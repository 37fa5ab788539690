use std::sync::Arc;

use serde::Deserialize;

use super::{chain_builder, coordinate, lenient_f64, Upstream};
use crate::chain::StrategyChain;
use crate::clock::Clock;
use crate::config::{Coordinates, DigestConfig};
use crate::domain::WeatherSample;
use crate::source::{FetchFuture, SourceId, Strategy, UpstreamError};

pub const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
pub const MET_NORWAY_COMPACT_URL: &str =
    "https://api.met.no/weatherapi/locationforecast/2.0/compact";

/// Weather chain: Open-Meteo first, MET Norway as fallback.
pub fn weather_chain(
    upstream: &Upstream,
    config: &DigestConfig,
    clock: Arc<dyn Clock>,
) -> StrategyChain<WeatherSample> {
    chain_builder(SourceId::Weather, config, clock)
        .then(OpenMeteoWeather::new(
            upstream.clone(),
            config.coordinates,
            config.timezone.name(),
        ))
        .then(MetNorwayWeather::new(upstream.clone(), config.coordinates))
        .build()
}

fn non_empty(strategy: &str, sample: WeatherSample) -> Result<WeatherSample, UpstreamError> {
    if sample.is_empty() {
        Err(UpstreamError::missing_data(format!(
            "'{strategy}' returned no weather fields"
        )))
    } else {
        Ok(sample)
    }
}

/// Open-Meteo forecast `current` block, wind requested in m/s.
#[derive(Debug, Clone)]
pub struct OpenMeteoWeather {
    upstream: Upstream,
    url: String,
}

impl OpenMeteoWeather {
    pub fn new(upstream: Upstream, at: Coordinates, timezone: &str) -> Self {
        let url = format!(
            "{OPEN_METEO_FORECAST_URL}?latitude={}&longitude={}\
             &current=temperature_2m,relative_humidity_2m,precipitation,wind_speed_10m\
             &wind_speed_unit=ms&timezone={}",
            coordinate(at.latitude),
            coordinate(at.longitude),
            urlencoding::encode(timezone),
        );
        Self { upstream, url }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Deserialize)]
struct OpenMeteoForecast {
    #[serde(default)]
    current: Option<OpenMeteoCurrent>,
}

#[derive(Debug, Default, Deserialize)]
struct OpenMeteoCurrent {
    #[serde(default, deserialize_with = "lenient_f64")]
    temperature_2m: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    relative_humidity_2m: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    precipitation: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_speed_10m: Option<f64>,
}

impl Strategy<WeatherSample> for OpenMeteoWeather {
    fn name(&self) -> &'static str {
        "open_meteo_current"
    }

    fn fetch(&self) -> FetchFuture<'_, WeatherSample> {
        Box::pin(async move {
            let body: OpenMeteoForecast = self.upstream.get_json(&self.url).await?;
            let current = body.current.unwrap_or_default();
            non_empty(
                self.name(),
                WeatherSample {
                    air_temp_c: current.temperature_2m,
                    humidity_pct: current.relative_humidity_2m,
                    precip_mm: current.precipitation,
                    wind_mps: current.wind_speed_10m,
                },
            )
        })
    }
}

/// MET Norway locationforecast (compact), first timeseries entry.
///
/// Precipitation comes from the `next_1_hours` summary of that entry.
#[derive(Debug, Clone)]
pub struct MetNorwayWeather {
    upstream: Upstream,
    url: String,
}

impl MetNorwayWeather {
    pub fn new(upstream: Upstream, at: Coordinates) -> Self {
        let url = format!(
            "{MET_NORWAY_COMPACT_URL}?lat={}&lon={}",
            coordinate(at.latitude),
            coordinate(at.longitude),
        );
        Self { upstream, url }
    }
}

#[derive(Debug, Deserialize)]
struct MetForecast {
    properties: MetProperties,
}

#[derive(Debug, Deserialize)]
struct MetProperties {
    #[serde(default)]
    timeseries: Vec<MetStep>,
}

#[derive(Debug, Deserialize)]
struct MetStep {
    data: MetStepData,
}

#[derive(Debug, Deserialize)]
struct MetStepData {
    instant: MetDetailsBlock<MetInstant>,
    #[serde(default)]
    next_1_hours: Option<MetDetailsBlock<MetNextHour>>,
}

#[derive(Debug, Deserialize)]
struct MetDetailsBlock<D> {
    details: D,
}

#[derive(Debug, Deserialize)]
struct MetInstant {
    #[serde(default, deserialize_with = "lenient_f64")]
    air_temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    relative_humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MetNextHour {
    #[serde(default, deserialize_with = "lenient_f64")]
    precipitation_amount: Option<f64>,
}

impl Strategy<WeatherSample> for MetNorwayWeather {
    fn name(&self) -> &'static str {
        "met_norway_compact"
    }

    fn fetch(&self) -> FetchFuture<'_, WeatherSample> {
        Box::pin(async move {
            let body: MetForecast = self.upstream.get_json(&self.url).await?;
            let step = body
                .properties
                .timeseries
                .into_iter()
                .next()
                .ok_or_else(|| UpstreamError::missing_data("met.no timeseries is empty"))?;

            let instant = step.data.instant.details;
            non_empty(
                self.name(),
                WeatherSample {
                    air_temp_c: instant.air_temperature,
                    humidity_pct: instant.relative_humidity,
                    precip_mm: step
                        .data
                        .next_1_hours
                        .and_then(|next| next.details.precipitation_amount),
                    wind_mps: instant.wind_speed,
                },
            )
        })
    }
}
