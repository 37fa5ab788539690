use chrono::Utc;
use morningshow_core::DigestAssembler;
use serde::Serialize;

use crate::cli::BriefArgs;
use crate::error::CliError;

use super::CommandOutput;

#[derive(Debug, Serialize)]
struct BriefResponseData<'a> {
    date: String,
    timezone: String,
    text: &'a str,
    speech_text: &'a str,
}

pub async fn run(args: &BriefArgs, assembler: &DigestAssembler) -> Result<CommandOutput, CliError> {
    let now = Utc::now();
    let digest = assembler.build_digest(now).await;

    let data = serde_json::to_value(BriefResponseData {
        date: assembler.local_date(now).to_string(),
        timezone: assembler.timezone().to_string(),
        text: &digest.text,
        speech_text: &digest.speech_text,
    })?;
    let text = if args.speech {
        digest.speech_text.clone()
    } else {
        digest.text.clone()
    };

    Ok(CommandOutput::new(text, data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::offline_assembler;

    #[tokio::test]
    async fn offline_brief_prints_placeholders_and_carries_both_variants() {
        let assembler = offline_assembler();

        let output = run(&BriefArgs { speech: false }, &assembler)
            .await
            .expect("brief never fails on upstream errors");

        assert!(output.text.contains("воздух —"));
        assert_eq!(output.data["timezone"], "Asia/Qatar");
        assert!(output.data["speech_text"]
            .as_str()
            .is_some_and(|speech| speech.contains("нет данных")));
    }

    #[tokio::test]
    async fn speech_flag_selects_speech_variant() {
        let assembler = offline_assembler();

        let output = run(&BriefArgs { speech: true }, &assembler)
            .await
            .expect("brief never fails on upstream errors");

        assert!(output.text.contains("нет данных"));
        assert!(!output.text.contains("°C"));
    }
}
