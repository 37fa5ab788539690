//! Source identifiers, the upstream strategy contract and its error type.
//!
//! Every data domain in the digest is a *source*. A source is served by an
//! ordered list of [`Strategy`] implementations, each one a single upstream
//! query that either yields the domain value or an [`UpstreamError`].
//!
//! | Source | Value | Default TTL |
//! |--------|-------|-------------|
//! | [`SourceId::Weather`] | [`WeatherSample`](crate::WeatherSample) | 600 s |
//! | [`SourceId::Sea`] | sea surface temperature, °C | 600 s |
//! | [`SourceId::Crypto`] | BTC and XRP [`PriceQuote`](crate::PriceQuote)s | 300 s |
//! | [`SourceId::Metal`] | XAU [`PriceQuote`](crate::PriceQuote) | 600 s |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::http_client::HttpError;

/// Canonical source identifiers used in logs, reports and cache names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Weather,
    Sea,
    Crypto,
    Metal,
}

impl SourceId {
    pub const ALL: [Self; 4] = [Self::Weather, Self::Sea, Self::Crypto, Self::Metal];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Sea => "sea",
            Self::Crypto => "crypto",
            Self::Metal => "metal",
        }
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    Transport,
    Timeout,
    Status,
    Malformed,
    MissingData,
    CircuitOpen,
    RateLimited,
    Exhausted,
}

/// Failure of one strategy, or of a whole chain.
///
/// Never fatal to digest construction: the assembler turns it into a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    kind: UpstreamErrorKind,
    message: String,
}

impl UpstreamError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Timeout, message)
    }

    pub fn status(status: u16) -> Self {
        Self::new(
            UpstreamErrorKind::Status,
            format!("upstream returned status {status}"),
        )
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Malformed, message)
    }

    pub fn missing_data(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::MissingData, message)
    }

    pub fn circuit_open(strategy: &str) -> Self {
        Self::new(
            UpstreamErrorKind::CircuitOpen,
            format!("circuit breaker for '{strategy}' is open; skipping upstream call"),
        )
    }

    pub fn rate_limited(strategy: &str) -> Self {
        Self::new(
            UpstreamErrorKind::RateLimited,
            format!("'{strategy}' has no request budget available"),
        )
    }

    pub fn exhausted(source: SourceId, attempts: usize) -> Self {
        Self::new(
            UpstreamErrorKind::Exhausted,
            format!("all {attempts} strategies failed for source '{source}'"),
        )
    }

    fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> UpstreamErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            UpstreamErrorKind::Transport => "upstream.transport",
            UpstreamErrorKind::Timeout => "upstream.timeout",
            UpstreamErrorKind::Status => "upstream.status",
            UpstreamErrorKind::Malformed => "upstream.malformed",
            UpstreamErrorKind::MissingData => "upstream.missing_data",
            UpstreamErrorKind::CircuitOpen => "upstream.circuit_open",
            UpstreamErrorKind::RateLimited => "upstream.rate_limited",
            UpstreamErrorKind::Exhausted => "upstream.exhausted",
        }
    }

    /// Whether this failure should count against the strategy's circuit breaker.
    ///
    /// Skips caused by the breaker itself or by an empty rate budget never reached
    /// the upstream, so they say nothing about its health.
    pub const fn counts_as_upstream_failure(&self) -> bool {
        !matches!(
            self.kind,
            UpstreamErrorKind::CircuitOpen | UpstreamErrorKind::RateLimited
        )
    }
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for UpstreamError {}

impl From<HttpError> for UpstreamError {
    fn from(error: HttpError) -> Self {
        if error.timed_out() {
            Self::timeout(format!("request timed out: {}", error.message()))
        } else {
            Self::transport(error.message().to_owned())
        }
    }
}

/// Boxed future returned by [`Strategy::fetch`].
pub type FetchFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UpstreamError>> + Send + 'a>>;

/// One upstream query for a source.
///
/// Implementations are stateless apart from their configuration and must be
/// `Send + Sync`: a chain is shared by every concurrent digest request.
pub trait Strategy<T>: Send + Sync {
    /// Stable name used in logs and chain reports, e.g. `open_meteo`.
    fn name(&self) -> &'static str;

    /// Performs the upstream call and normalizes its payload.
    ///
    /// # Errors
    ///
    /// Returns [`UpstreamError`] on transport failure, non-2xx status, malformed
    /// JSON, or a payload without any usable value.
    fn fetch(&self) -> FetchFuture<'_, T>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_timeouts_map_to_timeout_kind() {
        let error = UpstreamError::from(HttpError::timeout("8s elapsed"));
        assert_eq!(error.kind(), UpstreamErrorKind::Timeout);
        assert_eq!(error.code(), "upstream.timeout");

        let error = UpstreamError::from(HttpError::new("connection refused"));
        assert_eq!(error.kind(), UpstreamErrorKind::Transport);
    }

    #[test]
    fn breaker_skips_do_not_count_as_upstream_failures() {
        assert!(!UpstreamError::circuit_open("coingecko").counts_as_upstream_failure());
        assert!(!UpstreamError::rate_limited("coingecko").counts_as_upstream_failure());
        assert!(UpstreamError::status(503).counts_as_upstream_failure());
    }
}
