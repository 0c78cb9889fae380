//! Data models for DecisionDesk

mod meeting;
mod operation;
mod remote;

pub use meeting::{Meeting, MeetingId, MeetingPatch, MeetingStatus, ParseStatusError};
pub use operation::{Operation, OperationId, OperationPayload};
pub use remote::{
    CreatedRecord, ProcessingOptions, RemoteSnapshot, RemoteStatus, TranscriptionProvider,
    WhisperModel,
};
