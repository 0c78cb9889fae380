//! Backend-facing types: snapshots, acknowledgements and processing options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::meeting::MeetingStatus;

/// Status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RemoteStatus {
    New,
    Processing,
    Done,
    Error,
}

impl From<RemoteStatus> for MeetingStatus {
    fn from(status: RemoteStatus) -> Self {
        match status {
            RemoteStatus::New => Self::New,
            RemoteStatus::Processing => Self::Processing,
            RemoteStatus::Done => Self::Done,
            RemoteStatus::Error => Self::Error,
        }
    }
}

/// Identity handed out by the backend when it accepts a new meeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub remote_id: String,
    /// Server creation timestamp (Unix ms)
    pub created_at: i64,
}

/// Authoritative view of one meeting as held by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSnapshot {
    pub id: String,
    pub status: RemoteStatus,
    /// Server creation timestamp (Unix ms)
    pub created_at: Option<i64>,
    pub title: Option<String>,
    pub duration_sec: Option<i64>,
    pub transcript_text: Option<String>,
    pub language: Option<String>,
    pub cost_usd: Option<f64>,
    pub cost_brl: Option<f64>,
    pub minutes: Option<f64>,
}

impl RemoteSnapshot {
    /// Snapshot carrying only identity and status
    #[must_use]
    pub fn bare(id: impl Into<String>, status: RemoteStatus) -> Self {
        Self {
            id: id.into(),
            status,
            created_at: None,
            title: None,
            duration_sec: None,
            transcript_text: None,
            language: None,
            cost_usd: None,
            cost_brl: None,
            minutes: None,
        }
    }
}

/// Transcription backend selected for a processing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionProvider {
    /// OpenAI Whisper API
    #[default]
    RemoteOpenai,
    /// whisper.cpp on the backend host
    ServerLocal,
    /// whisper.cpp on a desktop worker, queued
    DesktopLocal,
}

impl TranscriptionProvider {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RemoteOpenai => "remote_openai",
            Self::ServerLocal => "server_local",
            Self::DesktopLocal => "desktop_local",
        }
    }
}

impl fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TranscriptionProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "remote_openai" => Ok(Self::RemoteOpenai),
            "server_local" => Ok(Self::ServerLocal),
            "desktop_local" => Ok(Self::DesktopLocal),
            other => Err(format!("unknown transcription provider: {other}")),
        }
    }
}

/// Whisper model size for local providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WhisperModel {
    #[default]
    #[serde(rename = "large-v3")]
    LargeV3,
    #[serde(rename = "medium")]
    Medium,
    #[serde(rename = "small")]
    Small,
    #[serde(rename = "base")]
    Base,
    #[serde(rename = "tiny")]
    Tiny,
}

impl WhisperModel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LargeV3 => "large-v3",
            Self::Medium => "medium",
            Self::Small => "small",
            Self::Base => "base",
            Self::Tiny => "tiny",
        }
    }
}

impl fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WhisperModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "large-v3" => Ok(Self::LargeV3),
            "medium" => Ok(Self::Medium),
            "small" => Ok(Self::Small),
            "base" => Ok(Self::Base),
            "tiny" => Ok(Self::Tiny),
            other => Err(format!("unknown whisper model: {other}")),
        }
    }
}

/// Options sent with a processing (transcription) request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProcessingOptions {
    #[serde(default)]
    pub provider: TranscriptionProvider,
    #[serde(default)]
    pub model: WhisperModel,
    #[serde(default)]
    pub enable_diarization: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_status_maps_onto_meeting_status() {
        assert_eq!(MeetingStatus::from(RemoteStatus::New), MeetingStatus::New);
        assert_eq!(
            MeetingStatus::from(RemoteStatus::Processing),
            MeetingStatus::Processing
        );
    }

    #[test]
    fn remote_status_parses_backend_labels() {
        let status: RemoteStatus = serde_json::from_str("\"DONE\"").unwrap();
        assert_eq!(status, RemoteStatus::Done);
    }

    #[test]
    fn processing_options_default_to_remote_large_model() {
        let options = ProcessingOptions::default();
        assert_eq!(options.provider, TranscriptionProvider::RemoteOpenai);
        assert_eq!(options.model, WhisperModel::LargeV3);
        assert!(!options.enable_diarization);
    }

    #[test]
    fn processing_options_use_backend_value_names() {
        let options = ProcessingOptions {
            provider: TranscriptionProvider::DesktopLocal,
            model: WhisperModel::Small,
            enable_diarization: true,
        };
        let json = serde_json::to_value(options).unwrap();
        assert_eq!(json["provider"], "desktop_local");
        assert_eq!(json["model"], "small");
    }

    #[test]
    fn provider_and_model_parse_from_cli_values() {
        assert_eq!(
            "server_local".parse::<TranscriptionProvider>().unwrap(),
            TranscriptionProvider::ServerLocal
        );
        assert_eq!("tiny".parse::<WhisperModel>().unwrap(), WhisperModel::Tiny);
        assert!("huge".parse::<WhisperModel>().is_err());
    }
}
