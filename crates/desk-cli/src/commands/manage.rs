use desk_core::config::EngineConfig;

use crate::commands::common::{format_drain_report, open_engine, resolve_meeting};
use crate::error::CliError;

pub async fn run_retry(id: &str, config: &EngineConfig, metered: bool) -> Result<(), CliError> {
    let session = open_engine(config, true, metered).await?;
    let meeting = resolve_meeting(id, &session.engine).await?;

    let op_id = session.engine.retry(&meeting.id).await?;
    println!("Re-queued upload {op_id} for {}", meeting.id);

    let report = session.engine.trigger_sync().await?;
    eprintln!("{}", format_drain_report(&report));
    Ok(())
}

pub async fn run_delete(id: &str, config: &EngineConfig) -> Result<(), CliError> {
    let session = open_engine(config, false, false).await?;
    let meeting = resolve_meeting(id, &session.engine).await?;

    session.engine.delete(&meeting.id).await?;
    println!("{}", meeting.id);
    Ok(())
}
