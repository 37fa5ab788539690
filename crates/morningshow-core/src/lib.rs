//! # Morningshow Core
//!
//! Resilient data aggregation for a short morning digest: weather, sea
//! temperature, crypto and gold prices, and a quote of the day.
//!
//! ## Overview
//!
//! Every data domain is a *source*. A source is an ordered chain of upstream
//! strategies behind its own TTL cache:
//!
//! - **TTL cache** with single-flight refresh and optional stale grace
//! - **Strategy chains** with per-strategy timeouts, circuit breakers and rate budgets
//! - **Digest assembler** that gathers all sources concurrently and never fails
//! - **Quote selector** keyed by the calendar date
//!
//! A failing source only turns its own fields into the `—` placeholder.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`assembler`] | Cached sources and digest assembly |
//! | [`cache`] | Single-slot TTL cache |
//! | [`chain`] | Ordered strategy fallback |
//! | [`circuit_breaker`] | Per-strategy circuit breaker |
//! | [`clock`] | Injectable monotonic clock |
//! | [`config`] | `MORNINGSHOW_*` environment configuration |
//! | [`domain`] | Weather samples, price quotes, digest types |
//! | [`error`] | Configuration and formatting errors |
//! | [`fetchers`] | Concrete upstream strategies per source |
//! | [`format`] | Fixed-precision formatting and placeholders |
//! | [`http_client`] | HTTP client abstraction (reqwest, offline, mock) |
//! | [`quotes`] | Quote of the day |
//! | [`render`] | Text and speech templates |
//! | [`source`] | Source identifiers, strategy trait, upstream errors |
//! | [`throttling`] | Rate budgets for limited upstreams |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use morningshow_core::{DigestAssembler, DigestConfig, ReqwestHttpClient, SystemClock};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DigestConfig::from_env()?;
//!     let assembler = DigestAssembler::from_config(
//!         &config,
//!         Arc::new(ReqwestHttpClient::new()),
//!         Arc::new(SystemClock),
//!     );
//!
//!     let digest = assembler.build_digest(chrono::Utc::now()).await;
//!     println!("{}", digest.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ DigestAssembler │  tokio::join! over four sources
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  CachedSource   │────▶│    TtlCache      │
//! └────────┬────────┘     └──────────────────┘
//!          │ miss
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ StrategyChain   │────▶│ Circuit Breaker  │
//! └────────┬────────┘     │ Rate Budget      │
//!          │              └──────────────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Strategy        │────▶│ HTTP Client      │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Upstream failures are values, not panics:
//!
//! ```rust
//! use morningshow_core::{UpstreamError, UpstreamErrorKind};
//!
//! fn describe(error: &UpstreamError) -> &'static str {
//!     match error.kind() {
//!         UpstreamErrorKind::Timeout => "slow upstream",
//!         UpstreamErrorKind::CircuitOpen | UpstreamErrorKind::RateLimited => "skipped",
//!         _ => "failed",
//!     }
//! }
//!
//! assert_eq!(describe(&UpstreamError::timeout("8s")), "slow upstream");
//! ```

pub mod assembler;
pub mod cache;
pub mod chain;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetchers;
pub mod format;
pub mod http_client;
pub mod quotes;
pub mod render;
pub mod source;
pub mod throttling;

// Assembly
pub use assembler::{CachedSource, DigestAssembler, DigestSources, SourceReport};

// Caching
pub use cache::{CacheEntry, CacheStats, TtlCache};

// Chains
pub use chain::{
    AttemptError, ChainFailure, ChainResult, ChainSuccess, Fillable, LinkSnapshot, StrategyChain,
    StrategyChainBuilder,
};

// Circuit breaker
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

// Clocks
pub use clock::{Clock, ManualClock, SystemClock};

// Configuration
pub use config::{CacheTtls, Coordinates, DigestConfig};

// Domain models
pub use domain::{Asset, Digest, DigestInput, PriceQuote, WeatherSample};

// Error types
pub use error::{ConfigError, FormatError};

// Formatting
pub use format::{MAX_DIGEST_CHARS, PLACEHOLDER};

// HTTP client types
pub use http_client::{
    HttpClient, HttpError, HttpRequest, HttpResponse, MockHttpClient, MockReply,
    OfflineHttpClient, ReqwestHttpClient,
};

// Quotes and rendering
pub use quotes::QuoteBook;
pub use render::{render_digest, SPOKEN_PLACEHOLDER};

// Sources
pub use source::{FetchFuture, SourceId, Strategy, UpstreamError, UpstreamErrorKind};

// Throttling
pub use throttling::RateBudget;
