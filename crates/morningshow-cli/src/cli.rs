//! CLI argument definitions for morningshow.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `brief` | Build and print the digest for the current instant |
//! | `quote` | Print the quote of the day |
//! | `sources` | List sources with TTLs, strategy order and breaker state |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `text` | Output format (text, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--offline` | `false` | Use a transport that always fails |
//!
//! # Examples
//!
//! ```bash
//! morningshow brief
//! morningshow brief --speech
//! morningshow quote --date 2024-06-03
//! morningshow --format json --pretty sources
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Morning digest: weather, sea, crypto and gold prices, quote of the day.
#[derive(Debug, Parser)]
#[command(
    name = "morningshow",
    author,
    version,
    about = "Resilient morning digest aggregator",
    long_about = "morningshow gathers weather, sea temperature, BTC/XRP and gold prices \
from public APIs, each behind a TTL cache and an ordered list of fallback upstreams, \
and renders a short Russian-language digest.\n\
\n\
A failing upstream never fails the digest; its fields show a placeholder.\n\
\n\
Configuration is read from MORNINGSHOW_* environment variables (a .env file is honoured)."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Never touch the network; every upstream fails.
    #[arg(long, global = true, default_value_t = false)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text for terminals and pipes.
    Text,
    /// Single JSON object output.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build and print the digest.
    ///
    /// # Examples
    ///
    ///   morningshow brief
    ///   morningshow brief --speech
    Brief(BriefArgs),

    /// Print the quote of the day.
    ///
    /// # Examples
    ///
    ///   morningshow quote
    ///   morningshow quote --date 2024-06-03
    Quote(QuoteArgs),

    /// List every source with its TTL, strategies, breaker state and cache stats.
    Sources,
}

/// Arguments for the `brief` command.
#[derive(Debug, Args)]
pub struct BriefArgs {
    /// Print the speech variant instead of the display text.
    #[arg(long, default_value_t = false)]
    pub speech: bool,
}

/// Arguments for the `quote` command.
#[derive(Debug, Args)]
pub struct QuoteArgs {
    /// Calendar date (YYYY-MM-DD); defaults to today in the configured zone.
    #[arg(long)]
    pub date: Option<String>,
}
