//! Merge of authoritative remote state into local records.

use crate::models::{Meeting, MeetingId, MeetingStatus, RemoteSnapshot};
use crate::util::unix_millis_now;

/// Combine a local record (if any) with a remote snapshot.
///
/// Identity (`remote_id`, `created_at`) is only adopted when the local record
/// has none yet. Result fields are replaced when the snapshot carries a value
/// and kept otherwise. Status follows the snapshot unless that would move the
/// meeting backwards. `recording_ref`, `sync_error` and `updated_at` belong to
/// the local side and are never changed here.
pub fn reconcile(local: Option<&Meeting>, remote: &RemoteSnapshot) -> Meeting {
    let Some(local) = local else {
        return from_remote(remote);
    };

    let mut merged = local.clone();
    if merged.remote_id.is_none() {
        merged.remote_id = Some(remote.id.clone());
        if let Some(created_at) = remote.created_at {
            merged.created_at = created_at;
        }
    }

    let next = MeetingStatus::from(remote.status);
    if merged.status.accepts_remote(next) {
        merged.status = next;
    }

    overwrite(&mut merged.title, remote.title.as_ref());
    overwrite(&mut merged.duration_sec, remote.duration_sec.as_ref());
    overwrite(&mut merged.transcript_text, remote.transcript_text.as_ref());
    overwrite(&mut merged.language, remote.language.as_ref());
    overwrite(&mut merged.cost_usd, remote.cost_usd.as_ref());
    overwrite(&mut merged.cost_brl, remote.cost_brl.as_ref());
    overwrite(&mut merged.minutes, remote.minutes.as_ref());
    merged
}

fn from_remote(remote: &RemoteSnapshot) -> Meeting {
    let now = unix_millis_now();
    Meeting {
        id: MeetingId::new(),
        remote_id: Some(remote.id.clone()),
        status: remote.status.into(),
        created_at: remote.created_at.unwrap_or(now),
        recording_ref: None,
        title: remote.title.clone(),
        duration_sec: remote.duration_sec,
        transcript_text: remote.transcript_text.clone(),
        language: remote.language.clone(),
        cost_usd: remote.cost_usd,
        cost_brl: remote.cost_brl,
        minutes: remote.minutes,
        sync_error: None,
        updated_at: now,
    }
}

fn overwrite<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
    if let Some(value) = value {
        *slot = Some(value.clone());
    }
}
