use desk_core::config::EngineConfig;
use desk_core::models::{ProcessingOptions, TranscriptionProvider, WhisperModel};

use crate::commands::common::{open_engine, resolve_meeting};
use crate::error::CliError;

pub async fn run_transcribe(
    id: &str,
    provider: Option<TranscriptionProvider>,
    model: Option<WhisperModel>,
    diarize: bool,
    config: &EngineConfig,
    metered: bool,
) -> Result<(), CliError> {
    let options = processing_options(&config.default_processing, provider, model, diarize);
    let session = open_engine(config, true, metered).await?;
    let meeting = resolve_meeting(id, &session.engine).await?;

    let op_id = session
        .engine
        .request_processing(&meeting.id, options)
        .await?;
    let status = session
        .engine
        .get(&meeting.id)
        .await?
        .map_or(meeting.status, |current| current.status);
    println!("Queued {op_id}; meeting {} is {status}", meeting.id);
    Ok(())
}

/// Command-line choices layered over the configured defaults
pub fn processing_options(
    defaults: &ProcessingOptions,
    provider: Option<TranscriptionProvider>,
    model: Option<WhisperModel>,
    diarize: bool,
) -> ProcessingOptions {
    ProcessingOptions {
        provider: provider.unwrap_or(defaults.provider),
        model: model.unwrap_or(defaults.model),
        enable_diarization: diarize || defaults.enable_diarization,
    }
}
