use std::path::PathBuf;

use clap::{Parser, Subcommand};
use desk_core::models::{TranscriptionProvider, WhisperModel};
use desk_core::MeetingStatus;

#[derive(Parser)]
#[command(name = "desk")]
#[command(about = "Capture meetings offline and sync them with DecisionDesk")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Path to the JSON config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Backend base URL including /api/v1
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Treat the current connection as metered
    #[arg(long, global = true)]
    pub metered: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Capture a recording and queue its upload
    #[command(alias = "add")]
    Record {
        /// Audio file to import
        file: PathBuf,
        /// Only queue the upload; do not contact the backend
        #[arg(long)]
        no_sync: bool,
    },
    /// List meetings, newest first
    List {
        /// Number of meetings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
        /// Only show meetings with this status (e.g. PENDING_SYNC, DONE)
        #[arg(long, value_parser = parse_status)]
        status: Option<MeetingStatus>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one meeting
    Show {
        /// Meeting ID or unique ID prefix
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List operations waiting in the sync queue
    Queue {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Push queued operations to the backend
    Sync,
    /// Merge the backend's meetings into the local store
    Pull,
    /// Refresh one synced meeting from the backend
    Refresh {
        /// Meeting ID or unique ID prefix
        id: String,
    },
    /// Request transcription of a synced meeting
    Transcribe {
        /// Meeting ID or unique ID prefix
        id: String,
        /// remote_openai, server_local or desktop_local
        #[arg(long)]
        provider: Option<TranscriptionProvider>,
        /// Whisper model for local providers
        #[arg(long)]
        model: Option<WhisperModel>,
        /// Label speakers in the transcript
        #[arg(long)]
        diarize: bool,
    },
    /// Re-queue the upload of a rejected meeting
    Retry {
        /// Meeting ID or unique ID prefix
        id: String,
    },
    /// Delete a meeting and its queued operations
    Delete {
        /// Meeting ID or unique ID prefix
        id: String,
    },
    /// Stay running: sync on reconnect and pull periodically
    Watch,
    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a config file
    Init {
        /// Backend base URL including /api/v1
        #[arg(long, value_name = "URL")]
        api_base_url: Option<String>,
        /// Allow syncing over metered connections
        #[arg(long)]
        allow_metered: bool,
        /// Wait for the backend before showing meetings as processing
        #[arg(long)]
        no_optimistic: bool,
        /// Seconds between background pulls
        #[arg(long, value_name = "SECS")]
        pull_interval: Option<u64>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_status(value: &str) -> Result<MeetingStatus, String> {
    value.parse::<MeetingStatus>().map_err(|error| error.to_string())
}
