use desk_core::config::EngineConfig;
use desk_core::SyncState;

use crate::commands::common::{
    format_drain_report, format_pull_report, open_engine, resolve_meeting,
};
use crate::error::CliError;

pub async fn run_sync(config: &EngineConfig, metered: bool) -> Result<(), CliError> {
    let session = open_engine(config, true, metered).await?;
    if session.engine.state() == SyncState::Offline {
        println!("Backend unreachable at {}; nothing sent", config.api_base_url);
        return Ok(());
    }

    let report = session.engine.trigger_sync().await?;
    println!("{}", format_drain_report(&report));
    Ok(())
}

pub async fn run_pull(config: &EngineConfig, metered: bool) -> Result<(), CliError> {
    let session = open_engine(config, true, metered).await?;
    let report = session.engine.pull().await?;
    println!("{}", format_pull_report(&report));
    Ok(())
}

pub async fn run_refresh(id: &str, config: &EngineConfig, metered: bool) -> Result<(), CliError> {
    let session = open_engine(config, true, metered).await?;
    let meeting = resolve_meeting(id, &session.engine).await?;
    let report = session.engine.refresh(&meeting.id).await?;
    println!("{}", format_pull_report(&report));
    Ok(())
}
