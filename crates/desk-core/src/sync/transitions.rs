//! Status changes applied when the backend acknowledges an operation.

use crate::models::{CreatedRecord, MeetingPatch, MeetingStatus, RemoteStatus};

/// The backend accepted the audio for a meeting it created.
///
/// Records the remote identity and server timestamp, and takes the status
/// the upload reported (`New` in practice).
pub fn upload_accepted(created: &CreatedRecord, status: RemoteStatus) -> MeetingPatch {
    MeetingPatch {
        remote_id: Some(created.remote_id.clone()),
        status: Some(status.into()),
        created_at: Some(created.created_at),
        sync_error: Some(None),
        ..MeetingPatch::default()
    }
}

/// The backend accepted a processing request.
///
/// With `optimistic` set the meeting shows `Processing` immediately; otherwise
/// it takes the acknowledged status if that is not a step backwards. Either
/// way `Done`/`Error` only arrive later through reconciliation.
pub fn processing_accepted(
    current: MeetingStatus,
    acknowledged: RemoteStatus,
    optimistic: bool,
) -> MeetingPatch {
    let next = if optimistic {
        MeetingStatus::Processing
    } else {
        MeetingStatus::from(acknowledged)
    };

    MeetingPatch {
        status: current.accepts_remote(next).then_some(next),
        ..MeetingPatch::default()
    }
}

/// The backend refused the operation for good
pub fn rejected(message: &str) -> MeetingPatch {
    MeetingPatch {
        status: Some(MeetingStatus::Error),
        sync_error: Some(Some(message.to_string())),
        ..MeetingPatch::default()
    }
}
