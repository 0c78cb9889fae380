//! Queued sync operation model

use serde::{Deserialize, Serialize};
use std::fmt;

use super::meeting::MeetingId;
use super::remote::{CreatedRecord, ProcessingOptions};

/// Queue-assigned sequence number; strictly increasing, never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub i64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a queued operation does once it reaches the head of the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationPayload {
    /// Create the remote meeting (unless checkpointed) and upload its audio
    Upload {
        recording_ref: String,
        /// Remote identity obtained by an earlier attempt whose upload failed
        #[serde(default, skip_serializing_if = "Option::is_none")]
        checkpoint: Option<CreatedRecord>,
    },
    /// Ask the backend to process an already uploaded meeting
    RequestProcessing { options: ProcessingOptions },
}

impl OperationPayload {
    /// Upload payload for a freshly captured recording
    pub fn upload(recording_ref: impl Into<String>) -> Self {
        Self::Upload {
            recording_ref: recording_ref.into(),
            checkpoint: None,
        }
    }

    /// Short label stored alongside the payload for diagnostics
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::RequestProcessing { .. } => "request_processing",
        }
    }

    /// Remote identity recorded by a partially completed upload
    pub const fn checkpoint(&self) -> Option<&CreatedRecord> {
        match self {
            Self::Upload { checkpoint, .. } => checkpoint.as_ref(),
            Self::RequestProcessing { .. } => None,
        }
    }
}

/// A durable intent to perform one remote side effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    /// Local meeting the operation targets
    pub meeting_id: MeetingId,
    pub payload: OperationPayload,
    /// Enqueue timestamp (Unix ms), diagnostics only
    pub enqueued_at: i64,
}
