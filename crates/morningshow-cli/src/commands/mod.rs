mod brief;
mod quote;
mod sources;

use std::sync::Arc;

use morningshow_core::{
    Clock, DigestAssembler, DigestConfig, HttpClient, OfflineHttpClient, ReqwestHttpClient,
    SystemClock,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// What a command prints: a plain-text rendering and a JSON payload.
#[derive(Debug)]
pub struct CommandOutput {
    pub text: String,
    pub data: Value,
}

impl CommandOutput {
    pub fn new(text: impl Into<String>, data: Value) -> Self {
        Self {
            text: text.into(),
            data,
        }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let config = DigestConfig::from_env()?;
    let assembler = assembler(&config, cli.offline);

    match &cli.command {
        Command::Brief(args) => brief::run(args, &assembler).await,
        Command::Quote(args) => quote::run(args, &assembler),
        Command::Sources => sources::run(&assembler),
    }
}

fn assembler(config: &DigestConfig, offline: bool) -> DigestAssembler {
    debug!(
        offline,
        timezone = %config.timezone,
        latitude = config.coordinates.latitude,
        longitude = config.coordinates.longitude,
        "configuration loaded"
    );
    let http: Arc<dyn HttpClient> = if offline {
        Arc::new(OfflineHttpClient)
    } else {
        Arc::new(ReqwestHttpClient::new())
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    DigestAssembler::from_config(config, http, clock)
}

#[cfg(test)]
pub(crate) fn offline_assembler() -> DigestAssembler {
    assembler(&DigestConfig::default(), true)
}
