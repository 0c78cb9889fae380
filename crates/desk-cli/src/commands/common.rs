use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use desk_core::config::EngineConfig;
use desk_core::db::Database;
use desk_core::gateway::HttpGateway;
use desk_core::models::{Operation, OperationPayload};
use desk_core::sync::connectivity::{self, NetworkStatus, WatchConnectivity};
use desk_core::sync::{DrainReport, PullReport};
use desk_core::{Meeting, MeetingId, SyncEngine};
use serde::Serialize;
use tokio::sync::watch;

use crate::error::CliError;

pub type CliEngine = SyncEngine<HttpGateway, WatchConnectivity>;

/// An opened engine plus the sender that drives its connectivity gate
pub struct Session {
    pub engine: CliEngine,
    pub network: watch::Sender<NetworkStatus>,
}

#[derive(Debug, Serialize)]
pub struct MeetingListItem {
    pub id: String,
    pub remote_id: Option<String>,
    pub title: String,
    pub status: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub relative_time: String,
    pub sync_error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OperationListItem {
    pub id: i64,
    pub meeting_id: String,
    pub kind: String,
    pub checkpoint_remote_id: Option<String>,
    pub enqueued_at: i64,
}

/// Open the store and wire an HTTP gateway.
///
/// With `probe` the backend's health endpoint decides whether the gate starts
/// open; without it the engine starts offline and never calls the backend.
pub async fn open_engine(
    config: &EngineConfig,
    probe: bool,
    metered: bool,
) -> Result<Session, CliError> {
    let gateway = HttpGateway::new(config.api_base_url.clone(), config.request_timeout())?;
    let initial = if probe {
        probe_network(&gateway, metered).await
    } else {
        NetworkStatus::offline()
    };

    let db = Database::open(config.resolved_db_path())?;
    let (network, signal) = connectivity::channel(initial);
    let engine = SyncEngine::new(db, gateway, signal, config.policy())?;
    Ok(Session { engine, network })
}

/// Reachability of the backend, reported on the transport the user declared
pub async fn probe_network(gateway: &HttpGateway, metered: bool) -> NetworkStatus {
    match gateway.health().await {
        Ok(()) if metered => NetworkStatus::metered(),
        Ok(()) => NetworkStatus::unmetered(),
        Err(error) => {
            tracing::debug!("Health check against {} failed: {error}", gateway.base_url());
            NetworkStatus::offline()
        }
    }
}

pub fn normalize_meeting_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyMeetingId);
    }
    Ok(trimmed.to_ascii_lowercase())
}

/// Find a meeting by full ID or unique ID prefix
pub async fn resolve_meeting(query: &str, engine: &CliEngine) -> Result<Meeting, CliError> {
    let query = normalize_meeting_identifier(query)?;
    if let Ok(id) = query.parse::<MeetingId>() {
        if let Some(meeting) = engine.get(&id).await? {
            return Ok(meeting);
        }
    }

    let mut matching = engine
        .list()
        .await?
        .into_iter()
        .filter(|meeting| meeting.id.to_string().starts_with(&query))
        .collect::<Vec<_>>();

    match matching.len() {
        0 => Err(CliError::MeetingNotFound(query)),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|meeting| short_id(&meeting.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousMeetingId(format!(
                "ID prefix '{query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

/// Copy a recording into the local library and return its reference.
///
/// The copy is named `<UTC capture time>-<original file name>`.
pub fn import_recording(file: &Path, recordings_dir: &Path) -> Result<String, CliError> {
    if !file.is_file() {
        return Err(CliError::RecordingNotFound(file.to_path_buf()));
    }
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::RecordingNotFound(file.to_path_buf()))?;

    std::fs::create_dir_all(recordings_dir)?;
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%3fZ");
    let target: PathBuf = recordings_dir.join(format!("{stamp}-{file_name}"));
    std::fs::copy(file, &target)?;

    Ok(format!("file://{}", target.display()))
}

pub fn short_id(id: &MeetingId) -> String {
    id.to_string().chars().take(13).collect()
}

pub fn meeting_to_list_item(meeting: &Meeting, now_ms: i64) -> MeetingListItem {
    MeetingListItem {
        id: meeting.id.to_string(),
        remote_id: meeting.remote_id.clone(),
        title: meeting.display_title(),
        status: meeting.status.to_string(),
        created_at: meeting.created_at,
        updated_at: meeting.updated_at,
        relative_time: format_relative_time(meeting.created_at, now_ms),
        sync_error: meeting.sync_error.clone(),
    }
}

pub fn format_meeting_lines(meetings: &[Meeting], now_ms: i64) -> Vec<String> {
    meetings
        .iter()
        .map(|meeting| {
            let mut line = format!(
                "{}  {:<12}  {}  ({})",
                short_id(&meeting.id),
                meeting.status.as_str(),
                meeting.display_title(),
                format_relative_time(meeting.created_at, now_ms)
            );
            if let Some(error) = &meeting.sync_error {
                line.push_str(&format!("  ! {error}"));
            }
            line
        })
        .collect()
}

pub fn operation_to_list_item(operation: &Operation) -> OperationListItem {
    OperationListItem {
        id: operation.id.0,
        meeting_id: operation.meeting_id.to_string(),
        kind: operation.payload.kind().to_string(),
        checkpoint_remote_id: operation
            .payload
            .checkpoint()
            .map(|created| created.remote_id.clone()),
        enqueued_at: operation.enqueued_at,
    }
}

pub fn format_operation_lines(operations: &[Operation], now_ms: i64) -> Vec<String> {
    operations
        .iter()
        .map(|operation| {
            let detail = match &operation.payload {
                OperationPayload::Upload { checkpoint, .. } => checkpoint
                    .as_ref()
                    .map(|created| format!("created as {}", created.remote_id))
                    .unwrap_or_default(),
                OperationPayload::RequestProcessing { options } => {
                    format!("{} / {}", options.provider, options.model)
                }
            };
            let line = format!(
                "{:<5} {:<18} {}  ({})",
                operation.id.to_string(),
                operation.payload.kind(),
                short_id(&operation.meeting_id),
                format_relative_time(operation.enqueued_at, now_ms)
            );
            if detail.is_empty() {
                line
            } else {
                format!("{line}  {detail}")
            }
        })
        .collect()
}

pub fn format_drain_report(report: &DrainReport) -> String {
    if report.coalesced {
        return "Sync already running; request folded into it".to_string();
    }
    if !report.made_progress() && report.halted.is_none() {
        return "Nothing to sync".to_string();
    }
    let mut summary = format!(
        "Synced {}, rejected {}, discarded {}",
        report.synced, report.rejected, report.discarded
    );
    if let Some(reason) = &report.halted {
        summary.push_str(&format!("; halted ({reason})"));
    }
    summary
}

pub fn format_pull_report(report: &PullReport) -> String {
    match report {
        PullReport::Applied { inserted, updated } => {
            format!("Pulled: {inserted} new, {updated} updated")
        }
        PullReport::Stale { reason } => format!("Pull skipped, local data kept: {reason}"),
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format_timestamp(timestamp_ms)
    }
}

pub fn format_timestamp(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |value| value.format("%Y-%m-%d %H:%M UTC").to_string(),
    )
}
