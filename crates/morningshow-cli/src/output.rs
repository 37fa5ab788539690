use std::io::{self, Write};

use crate::cli::OutputFormat;
use crate::commands::CommandOutput;
use crate::error::CliError;

pub fn render(output: &CommandOutput, format: OutputFormat, pretty: bool) -> Result<(), CliError> {
    let stdout = io::stdout();
    let mut writer = stdout.lock();
    write_output(&mut writer, output, format, pretty)?;
    writer.flush()?;
    Ok(())
}

fn write_output<W: Write>(
    writer: &mut W,
    output: &CommandOutput,
    format: OutputFormat,
    pretty: bool,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Text => writeln!(writer, "{}", output.text)?,
        OutputFormat::Json => {
            let payload = if pretty {
                serde_json::to_string_pretty(&output.data)?
            } else {
                serde_json::to_string(&output.data)?
            };
            writeln!(writer, "{payload}")?;
        }
    }
    Ok(())
}
