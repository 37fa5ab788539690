//! Digest configuration loaded from `MORNINGSHOW_*` environment variables.
//!
//! Every variable is optional. [`DigestConfig::from_lookup`] takes the variable
//! source as a function so tests never touch the process environment.

use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::ConfigError;
use crate::source::SourceId;

pub const ENV_LATITUDE: &str = "MORNINGSHOW_LATITUDE";
pub const ENV_LONGITUDE: &str = "MORNINGSHOW_LONGITUDE";
pub const ENV_TIMEZONE: &str = "MORNINGSHOW_TIMEZONE";
pub const ENV_LOCATION_LABEL: &str = "MORNINGSHOW_LOCATION_LABEL";
pub const ENV_TTL_WEATHER_SECS: &str = "MORNINGSHOW_TTL_WEATHER_SECS";
pub const ENV_TTL_SEA_SECS: &str = "MORNINGSHOW_TTL_SEA_SECS";
pub const ENV_TTL_CRYPTO_SECS: &str = "MORNINGSHOW_TTL_CRYPTO_SECS";
pub const ENV_TTL_METAL_SECS: &str = "MORNINGSHOW_TTL_METAL_SECS";
pub const ENV_UPSTREAM_TIMEOUT_MS: &str = "MORNINGSHOW_UPSTREAM_TIMEOUT_MS";
pub const ENV_STALE_GRACE_SECS: &str = "MORNINGSHOW_STALE_GRACE_SECS";
pub const ENV_BREAKER_FAILURES: &str = "MORNINGSHOW_BREAKER_FAILURES";
pub const ENV_BREAKER_OPEN_SECS: &str = "MORNINGSHOW_BREAKER_OPEN_SECS";
pub const ENV_COINGECKO_PER_MINUTE: &str = "MORNINGSHOW_COINGECKO_PER_MINUTE";

const MAX_UPSTREAM_TIMEOUT_MS: u64 = 10_000;

/// Geographic point the weather and sea sources are queried for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for Coordinates {
    /// Doha, Qatar.
    fn default() -> Self {
        Self {
            latitude: 25.2854,
            longitude: 51.5310,
        }
    }
}

/// Per-source cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub weather: Duration,
    pub sea: Duration,
    pub crypto: Duration,
    pub metal: Duration,
}

impl CacheTtls {
    pub const fn for_source(&self, source: SourceId) -> Duration {
        match source {
            SourceId::Weather => self.weather,
            SourceId::Sea => self.sea,
            SourceId::Crypto => self.crypto,
            SourceId::Metal => self.metal,
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            weather: Duration::from_secs(600),
            sea: Duration::from_secs(600),
            crypto: Duration::from_secs(300),
            metal: Duration::from_secs(600),
        }
    }
}

/// Everything needed to wire the sources and render a digest.
#[derive(Debug, Clone, PartialEq)]
pub struct DigestConfig {
    pub coordinates: Coordinates,
    pub timezone: Tz,
    pub location_label: String,
    pub ttls: CacheTtls,
    pub upstream_timeout: Duration,
    /// Zero disables stale-on-error serving.
    pub stale_grace: Duration,
    pub breaker: CircuitBreakerConfig,
    pub coingecko_per_minute: u32,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            coordinates: Coordinates::default(),
            timezone: chrono_tz::Asia::Qatar,
            location_label: "Катар".to_owned(),
            ttls: CacheTtls::default(),
            upstream_timeout: Duration::from_millis(8_000),
            stale_grace: Duration::ZERO,
            breaker: CircuitBreakerConfig::default(),
            coingecko_per_minute: 10,
        }
    }
}

impl DigestConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first variable that is set but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable source, falling back to
    /// defaults for unset or blank variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first invalid variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        let latitude = match get(ENV_LATITUDE) {
            Some(raw) => parse_in_range(ENV_LATITUDE, &raw, -90.0, 90.0, "a latitude in [-90, 90]")?,
            None => defaults.coordinates.latitude,
        };
        let longitude = match get(ENV_LONGITUDE) {
            Some(raw) => parse_in_range(
                ENV_LONGITUDE,
                &raw,
                -180.0,
                180.0,
                "a longitude in [-180, 180]",
            )?,
            None => defaults.coordinates.longitude,
        };

        let timezone = match get(ENV_TIMEZONE) {
            Some(raw) => Tz::from_str(&raw).map_err(|_| ConfigError::UnknownTimezone { value: raw })?,
            None => defaults.timezone,
        };

        let ttls = CacheTtls {
            weather: secs_or(&get, ENV_TTL_WEATHER_SECS, defaults.ttls.weather)?,
            sea: secs_or(&get, ENV_TTL_SEA_SECS, defaults.ttls.sea)?,
            crypto: secs_or(&get, ENV_TTL_CRYPTO_SECS, defaults.ttls.crypto)?,
            metal: secs_or(&get, ENV_TTL_METAL_SECS, defaults.ttls.metal)?,
        };

        let upstream_timeout = match get(ENV_UPSTREAM_TIMEOUT_MS) {
            Some(raw) => {
                let millis = parse_u64(ENV_UPSTREAM_TIMEOUT_MS, &raw, "milliseconds in 1..=10000")?;
                if millis == 0 || millis > MAX_UPSTREAM_TIMEOUT_MS {
                    return Err(invalid(ENV_UPSTREAM_TIMEOUT_MS, &raw, "milliseconds in 1..=10000"));
                }
                Duration::from_millis(millis)
            }
            None => defaults.upstream_timeout,
        };

        let stale_grace = match get(ENV_STALE_GRACE_SECS) {
            Some(raw) => Duration::from_secs(parse_u64(ENV_STALE_GRACE_SECS, &raw, "seconds >= 0")?),
            None => defaults.stale_grace,
        };

        let breaker = CircuitBreakerConfig {
            failure_threshold: match get(ENV_BREAKER_FAILURES) {
                Some(raw) => parse_positive_u32(ENV_BREAKER_FAILURES, &raw)?,
                None => defaults.breaker.failure_threshold,
            },
            open_timeout: match get(ENV_BREAKER_OPEN_SECS) {
                Some(raw) => Duration::from_secs(parse_u64(ENV_BREAKER_OPEN_SECS, &raw, "seconds >= 0")?),
                None => defaults.breaker.open_timeout,
            },
        };

        let coingecko_per_minute = match get(ENV_COINGECKO_PER_MINUTE) {
            Some(raw) => parse_positive_u32(ENV_COINGECKO_PER_MINUTE, &raw)?,
            None => defaults.coingecko_per_minute,
        };

        Ok(Self {
            coordinates: Coordinates {
                latitude,
                longitude,
            },
            timezone,
            location_label: get(ENV_LOCATION_LABEL).unwrap_or(defaults.location_label),
            ttls,
            upstream_timeout,
            stale_grace,
            breaker,
            coingecko_per_minute,
        })
    }
}

fn invalid(key: &'static str, raw: &str, expected: &'static str) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: raw.to_owned(),
        expected,
    }
}

fn parse_in_range(
    key: &'static str,
    raw: &str,
    min: f64,
    max: f64,
    expected: &'static str,
) -> Result<f64, ConfigError> {
    let value = raw
        .parse::<f64>()
        .map_err(|_| invalid(key, raw, expected))?;
    if !value.is_finite() || value < min || value > max {
        return Err(invalid(key, raw, expected));
    }
    Ok(value)
}

fn parse_u64(key: &'static str, raw: &str, expected: &'static str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|_| invalid(key, raw, expected))
}

fn parse_positive_u32(key: &'static str, raw: &str) -> Result<u32, ConfigError> {
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(invalid(key, raw, "an integer >= 1")),
    }
}

fn secs_or<G>(get: &G, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => match raw.parse::<u64>() {
            Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
            _ => Err(invalid(key, &raw, "seconds > 0")),
        },
        None => Ok(default),
    }
}
