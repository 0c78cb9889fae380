//! Meeting model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::unix_millis_now;

/// Local identifier of a meeting, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MeetingId(Uuid);

impl MeetingId {
    /// Create a new unique meeting ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for MeetingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MeetingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MeetingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Lifecycle status of a meeting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeetingStatus {
    /// Captured locally, not yet accepted by the backend
    PendingSync,
    /// Accepted by the backend with its audio
    New,
    /// Backend is processing the audio
    Processing,
    /// Processing finished
    Done,
    /// Processing or upload failed definitively
    Error,
}

impl MeetingStatus {
    /// Stable storage/wire label
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PendingSync => "PENDING_SYNC",
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Done => "DONE",
            Self::Error => "ERROR",
        }
    }

    /// Whether a status reported by the backend may replace this one.
    ///
    /// Nothing moves back to `PendingSync`. `Done` is terminal: once a meeting
    /// has finished it keeps that status, so no chain of updates can walk it
    /// back to `New`. `Processing -> New` stays allowed to undo an optimistic
    /// transition the backend never confirmed.
    pub const fn accepts_remote(self, next: Self) -> bool {
        match (self, next) {
            (_, Self::PendingSync) => false,
            (Self::Done, next) => matches!(next, Self::Done),
            _ => true,
        }
    }
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown status label
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown meeting status: {0}")]
pub struct ParseStatusError(pub String);

impl FromStr for MeetingStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING_SYNC" => Ok(Self::PendingSync),
            "NEW" => Ok(Self::New),
            "PROCESSING" => Ok(Self::Processing),
            "DONE" => Ok(Self::Done),
            "ERROR" => Ok(Self::Error),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}

/// A captured meeting tracked by the sync engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    /// Local identifier, assigned at capture
    pub id: MeetingId,
    /// Backend identifier, set once the backend accepts the meeting
    pub remote_id: Option<String>,
    /// Lifecycle status
    pub status: MeetingStatus,
    /// Creation timestamp (Unix ms); server value wins after first sync
    pub created_at: i64,
    /// Local reference to the captured audio
    pub recording_ref: Option<String>,
    pub title: Option<String>,
    pub duration_sec: Option<i64>,
    pub transcript_text: Option<String>,
    pub language: Option<String>,
    pub cost_usd: Option<f64>,
    pub cost_brl: Option<f64>,
    pub minutes: Option<f64>,
    /// Last rejection message from the backend (local only)
    pub sync_error: Option<String>,
    /// Last local write (Unix ms)
    pub updated_at: i64,
}

impl Meeting {
    /// Create a freshly captured meeting waiting for its first sync
    #[must_use]
    pub fn captured(recording_ref: impl Into<String>) -> Self {
        let now = unix_millis_now();
        Self {
            id: MeetingId::new(),
            remote_id: None,
            status: MeetingStatus::PendingSync,
            created_at: now,
            recording_ref: Some(recording_ref.into()),
            title: None,
            duration_sec: None,
            transcript_text: None,
            language: None,
            cost_usd: None,
            cost_brl: None,
            minutes: None,
            sync_error: None,
            updated_at: now,
        }
    }

    /// Whether the backend has accepted this meeting
    pub const fn is_synced(&self) -> bool {
        self.remote_id.is_some()
    }

    /// Display title, falling back to the capture time
    #[must_use]
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title.to_string();
        }
        chrono::DateTime::from_timestamp_millis(self.created_at).map_or_else(
            || "Untitled meeting".to_string(),
            |at| format!("Meeting {}", at.format("%Y-%m-%d %H:%M")),
        )
    }
}

/// Partial update applied to a stored meeting.
///
/// `remote_id` only fills an empty slot, and `PendingSync` is ignored once
/// the meeting has a remote identity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingPatch {
    pub remote_id: Option<String>,
    pub status: Option<MeetingStatus>,
    pub created_at: Option<i64>,
    pub recording_ref: Option<Option<String>>,
    pub sync_error: Option<Option<String>>,
}

impl MeetingPatch {
    /// Apply the patch to a meeting in place
    pub fn apply_to(&self, meeting: &mut Meeting) {
        if meeting.remote_id.is_none() {
            if let Some(remote_id) = &self.remote_id {
                meeting.remote_id = Some(remote_id.clone());
            }
        }
        if let Some(status) = self.status {
            if !(meeting.remote_id.is_some() && status == MeetingStatus::PendingSync) {
                meeting.status = status;
            }
        }
        if let Some(created_at) = self.created_at {
            meeting.created_at = created_at;
        }
        if let Some(recording_ref) = &self.recording_ref {
            meeting.recording_ref.clone_from(recording_ref);
        }
        if let Some(sync_error) = &self.sync_error {
            meeting.sync_error.clone_from(sync_error);
        }
    }

    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
