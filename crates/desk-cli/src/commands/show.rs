use chrono::Utc;
use desk_core::config::EngineConfig;
use desk_core::MeetingStatus;

use crate::commands::common::{
    format_meeting_lines, format_timestamp, meeting_to_list_item, open_engine, resolve_meeting,
    MeetingListItem,
};
use crate::error::CliError;

pub async fn run_list(
    limit: usize,
    status: Option<MeetingStatus>,
    as_json: bool,
    config: &EngineConfig,
) -> Result<(), CliError> {
    let session = open_engine(config, false, false).await?;
    let meetings = session
        .engine
        .list()
        .await?
        .into_iter()
        .filter(|meeting| status.is_none_or(|wanted| meeting.status == wanted))
        .take(limit)
        .collect::<Vec<_>>();
    let now_ms = Utc::now().timestamp_millis();

    if as_json {
        let items = meetings
            .iter()
            .map(|meeting| meeting_to_list_item(meeting, now_ms))
            .collect::<Vec<MeetingListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_meeting_lines(&meetings, now_ms) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn run_show(id: &str, as_json: bool, config: &EngineConfig) -> Result<(), CliError> {
    let session = open_engine(config, false, false).await?;
    let meeting = resolve_meeting(id, &session.engine).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&meeting)?);
        return Ok(());
    }

    println!("{}", meeting.display_title());
    println!("  id:        {}", meeting.id);
    println!(
        "  remote id: {}",
        meeting.remote_id.as_deref().unwrap_or("(not synced)")
    );
    println!("  status:    {}", meeting.status);
    println!("  created:   {}", format_timestamp(meeting.created_at));
    if let Some(duration) = meeting.duration_sec {
        println!("  duration:  {}m {:02}s", duration / 60, duration % 60);
    }
    if let Some(language) = &meeting.language {
        println!("  language:  {language}");
    }
    if let Some(cost) = meeting.cost_usd {
        println!("  cost:      ${cost:.4}");
    }
    if let Some(error) = &meeting.sync_error {
        println!("  error:     {error}");
    }
    if let Some(transcript) = &meeting.transcript_text {
        println!();
        println!("{transcript}");
    }
    Ok(())
}
