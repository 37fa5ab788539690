use std::fmt::Write as _;

use morningshow_core::{DigestAssembler, SourceReport};
use serde::Serialize;

use crate::error::CliError;

use super::CommandOutput;

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    sources: Vec<SourceReport>,
}

pub fn run(assembler: &DigestAssembler) -> Result<CommandOutput, CliError> {
    let sources = assembler.sources().reports();
    let text = render_text(&sources);
    let data = serde_json::to_value(SourcesResponseData { sources })?;

    Ok(CommandOutput::new(text, data))
}

fn render_text(reports: &[SourceReport]) -> String {
    let mut text = String::new();
    for report in reports {
        let _ = writeln!(text, "{} (ttl {}s)", report.source, report.ttl_secs);
        for (position, link) in report.strategies.iter().enumerate() {
            let budget = link
                .rate_limit_per_window
                .map(|limit| format!(", {limit}/min"))
                .unwrap_or_default();
            let _ = writeln!(
                text,
                "  {}. {} [{}{}]",
                position + 1,
                link.strategy,
                link.circuit,
                budget
            );
        }
        let _ = writeln!(
            text,
            "  cache: hits={} misses={} fetches={} failures={} stale_served={}",
            report.cache.hits,
            report.cache.misses,
            report.cache.fetches,
            report.cache.failures,
            report.cache.stale_served
        );
    }
    text.trim_end().to_owned()
}
