use std::path::Path;

use desk_core::config::EngineConfig;

use crate::commands::common::{format_drain_report, import_recording, open_engine};
use crate::error::CliError;

pub async fn run_record(
    file: &Path,
    no_sync: bool,
    config: &EngineConfig,
    metered: bool,
) -> Result<(), CliError> {
    let recording_ref = import_recording(file, &config.resolved_recordings_dir())?;
    let session = open_engine(config, !no_sync, metered).await?;
    let id = session.engine.record_and_enqueue(recording_ref).await?;
    println!("{id}");

    if !no_sync {
        let report = session.engine.trigger_sync().await?;
        eprintln!("{}", format_drain_report(&report));
    }
    Ok(())
}
