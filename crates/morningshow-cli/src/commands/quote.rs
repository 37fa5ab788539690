use chrono::{NaiveDate, Utc};
use morningshow_core::DigestAssembler;
use serde::Serialize;

use crate::cli::QuoteArgs;
use crate::error::CliError;

use super::CommandOutput;

#[derive(Debug, Serialize)]
struct QuoteResponseData<'a> {
    date: String,
    quote: &'a str,
}

pub fn run(args: &QuoteArgs, assembler: &DigestAssembler) -> Result<CommandOutput, CliError> {
    let date = match &args.date {
        Some(raw) => parse_date(raw)?,
        None => assembler.local_date(Utc::now()),
    };
    let quote = assembler.quote_book().quote_for(date);

    let data = serde_json::to_value(QuoteResponseData {
        date: date.to_string(),
        quote,
    })?;
    Ok(CommandOutput::new(quote, data))
}

fn parse_date(raw: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| CliError::InvalidDate {
        value: raw.to_owned(),
    })
}
