use std::io;
use std::path::PathBuf;

use desk_core::gateway::GatewayError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] desk_core::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Meeting ID cannot be empty")]
    EmptyMeetingId,
    #[error("Meeting not found for id/prefix: {0}")]
    MeetingNotFound(String),
    #[error("{0}")]
    AmbiguousMeetingId(String),
    #[error("Recording not found: {}", .0.display())]
    RecordingNotFound(PathBuf),
    #[error("Configuration error: {0}")]
    Config(String),
}
