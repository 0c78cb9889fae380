//! End-to-end behaviour of the sync engine against a scripted backend.

mod support;

use desk_core::db::{Database, OperationQueue, SqliteOperationQueue};
use desk_core::gateway::GatewayError;
use desk_core::models::{
    MeetingId, MeetingStatus, OperationPayload, ProcessingOptions, RemoteSnapshot, RemoteStatus,
};
use desk_core::sync::{HaltReason, NetworkStatus, PullReport, SyncPolicy};
use desk_core::{ErrorKind, SyncState};
use pretty_assertions::assert_eq;
use support::{eventually, harness_with, offline, online, Call, SERVER_EPOCH_MS};
use tempfile::tempdir;

const RECORDING: &str = "file:///recordings/standup.m4a";

#[tokio::test(flavor = "multi_thread")]
async fn capture_upload_process_and_pull() {
    let h = online();

    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
    let captured = h.engine.get(&id).await.unwrap().unwrap();
    assert_eq!(captured.status, MeetingStatus::PendingSync);
    assert_eq!(captured.remote_id, None);

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 1);
    assert_eq!(report.halted, None);

    let uploaded = h.engine.get(&id).await.unwrap().unwrap();
    assert_eq!(uploaded.status, MeetingStatus::New);
    assert_eq!(uploaded.remote_id.as_deref(), Some("R1"));
    assert_eq!(uploaded.created_at, SERVER_EPOCH_MS + 1);
    assert_eq!(uploaded.recording_ref.as_deref(), Some(RECORDING));
    assert_eq!(h.engine.state(), SyncState::Synced);

    h.engine
        .request_processing(&id, ProcessingOptions::default())
        .await
        .unwrap();
    let processing = h.engine.get(&id).await.unwrap().unwrap();
    assert_eq!(processing.status, MeetingStatus::Processing);

    let report = h.engine.pull().await.unwrap();
    assert_eq!(
        report,
        PullReport::Applied {
            inserted: 0,
            updated: 0
        }
    );

    h.gateway.update("R1", |record| {
        record.status = RemoteStatus::Done;
        record.title = Some("Daily standup".to_string());
        record.transcript_text = Some("Nothing blocked today.".to_string());
        record.cost_usd = Some(0.06);
    });
    let report = h.engine.pull().await.unwrap();
    assert_eq!(
        report,
        PullReport::Applied {
            inserted: 0,
            updated: 1
        }
    );

    let done = h.engine.get(&id).await.unwrap().unwrap();
    assert_eq!(done.status, MeetingStatus::Done);
    assert_eq!(done.title.as_deref(), Some("Daily standup"));
    assert_eq!(done.transcript_text.as_deref(), Some("Nothing blocked today."));
    assert_eq!(done.cost_usd, Some(0.06));
    assert_eq!(done.recording_ref.as_deref(), Some(RECORDING));
    assert_eq!(h.engine.list().await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_waits_while_offline() {
    let h = offline();
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 0);
    assert_eq!(report.halted, Some(HaltReason::Offline));
    assert!(h.gateway.calls().is_empty());
    assert_eq!(h.engine.state(), SyncState::Offline);

    let meeting = h.engine.get(&id).await.unwrap().unwrap();
    assert_eq!(meeting.status, MeetingStatus::PendingSync);
    assert_eq!(h.engine.pending_operations().await.unwrap().len(), 1);

    h.network.send(NetworkStatus::unmetered()).unwrap();
    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 1);
    assert!(h.engine.pending_operations().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn metered_link_is_closed_unless_allowed() {
    let db = Database::open_in_memory().unwrap();
    let h = harness_with(db, NetworkStatus::metered(), SyncPolicy::default());
    h.engine.record_and_enqueue(RECORDING).await.unwrap();

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.halted, Some(HaltReason::Offline));

    let db = Database::open_in_memory().unwrap();
    let policy = SyncPolicy {
        allow_metered: true,
        ..SyncPolicy::default()
    };
    let h = harness_with(db, NetworkStatus::metered(), policy);
    h.engine.record_and_enqueue(RECORDING).await.unwrap();

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn transient_failure_halts_in_order_and_reuses_checkpoint() {
    let h = online();
    let first = h.engine.record_and_enqueue("a.m4a").await.unwrap();
    let second = h.engine.record_and_enqueue("b.m4a").await.unwrap();
    h.gateway.fail_next(
        Call::Upload,
        GatewayError::Indeterminate("read timed out".to_string()),
    );

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 0);
    assert!(matches!(report.halted, Some(HaltReason::Transient(_))));
    assert_eq!(h.engine.state(), SyncState::Pending);

    let queued = h.engine.pending_operations().await.unwrap();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[0].meeting_id, first);
    assert_eq!(queued[1].meeting_id, second);
    assert_eq!(
        queued[0].payload.checkpoint().map(|c| c.remote_id.as_str()),
        Some("R1")
    );
    // A failed attempt never changes what readers see
    let pending = h.engine.get(&first).await.unwrap().unwrap();
    assert_eq!(pending.status, MeetingStatus::PendingSync);
    assert_eq!(pending.remote_id, None);

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 2);
    assert_eq!(h.gateway.created(), 2);

    let first = h.engine.get(&first).await.unwrap().unwrap();
    let second = h.engine.get(&second).await.unwrap().unwrap();
    assert_eq!(first.remote_id.as_deref(), Some("R1"));
    assert_eq!(second.remote_id.as_deref(), Some("R2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_create_leaves_queue_untouched() {
    let h = online();
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
    h.gateway.fail_next(
        Call::Create,
        GatewayError::Unreachable("connection refused".to_string()),
    );

    let report = h.engine.trigger_sync().await.unwrap();
    assert!(report.halted.is_some());

    let queued = h.engine.pending_operations().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].payload, OperationPayload::upload(RECORDING));
    assert_eq!(h.gateway.created(), 0);
    assert_eq!(
        h.engine.get(&id).await.unwrap().unwrap().status,
        MeetingStatus::PendingSync
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_upload_marks_error_and_retry_requeues() {
    let h = online();
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
    h.gateway.fail_next(
        Call::Upload,
        GatewayError::Rejected {
            status: 422,
            message: "unsupported audio format".to_string(),
        },
    );

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(report.halted, None);
    assert!(h.engine.pending_operations().await.unwrap().is_empty());

    let failed = h.engine.get(&id).await.unwrap().unwrap();
    assert_eq!(failed.status, MeetingStatus::Error);
    assert_eq!(failed.remote_id, None);
    assert!(failed.sync_error.as_deref().unwrap().contains("422"));

    h.engine.retry(&id).await.unwrap();
    let requeued = h.engine.get(&id).await.unwrap().unwrap();
    assert_eq!(requeued.status, MeetingStatus::PendingSync);
    assert_eq!(requeued.sync_error, None);

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 1);
    let accepted = h.engine.get(&id).await.unwrap().unwrap();
    assert_eq!(accepted.status, MeetingStatus::New);
    assert_eq!(accepted.remote_id.as_deref(), Some("R2"));
}

#[tokio::test(flavor = "multi_thread")]
async fn operations_for_missing_meetings_are_discarded() {
    let db = Database::open_in_memory().unwrap();
    SqliteOperationQueue::new(db.connection())
        .enqueue(&MeetingId::new(), &OperationPayload::upload("ghost.m4a"))
        .unwrap();
    let h = harness_with(db, NetworkStatus::unmetered(), SyncPolicy::default());
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.discarded, 1);
    assert_eq!(report.synced, 1);
    assert_eq!(h.gateway.created(), 1);
    assert_eq!(
        h.engine.get(&id).await.unwrap().unwrap().remote_id.as_deref(),
        Some("R1")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn records_and_queue_survive_restart() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("desk.db");

    let id = {
        let db = Database::open(&path).unwrap();
        let h = harness_with(db, NetworkStatus::offline(), SyncPolicy::default());
        let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
        h.engine.trigger_sync().await.unwrap();
        id
    };

    let db = Database::open(&path).unwrap();
    let h = harness_with(db, NetworkStatus::unmetered(), SyncPolicy::default());
    assert_eq!(h.engine.state(), SyncState::Pending);

    let meetings = h.engine.list().await.unwrap();
    assert_eq!(meetings.len(), 1);
    assert_eq!(meetings[0].id, id);
    assert_eq!(meetings[0].status, MeetingStatus::PendingSync);
    assert_eq!(h.engine.pending_operations().await.unwrap().len(), 1);

    let report = h.engine.trigger_sync().await.unwrap();
    assert_eq!(report.synced, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn commands_report_precondition_errors() {
    let h = offline();
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();

    let error = h
        .engine
        .request_processing(&id, ProcessingOptions::default())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Precondition);
    assert_eq!(h.engine.pending_operations().await.unwrap().len(), 1);

    let error = h.engine.retry(&id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Precondition);

    let error = h.engine.refresh(&id).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Precondition);

    let error = h
        .engine
        .request_processing(&MeetingId::new(), ProcessingOptions::default())
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::NotFound);

    let error = h.engine.record_and_enqueue("   ").await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::InvalidInput);
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_pull_leaves_store_unchanged() {
    let h = online();
    h.gateway.put(RemoteSnapshot {
        title: Some("Imported from web".to_string()),
        ..RemoteSnapshot::bare("R9", RemoteStatus::Done)
    });
    h.gateway.fail_next(
        Call::Fetch,
        GatewayError::Indeterminate("HTTP 502".to_string()),
    );

    let report = h.engine.pull().await.unwrap();
    assert!(report.is_stale());
    assert!(h.engine.list().await.unwrap().is_empty());

    let report = h.engine.pull().await.unwrap();
    assert_eq!(
        report,
        PullReport::Applied {
            inserted: 1,
            updated: 0
        }
    );
    let imported = h.engine.list().await.unwrap();
    assert_eq!(imported[0].remote_id.as_deref(), Some("R9"));
    assert_eq!(imported[0].recording_ref, None);

    let report = h.engine.pull().await.unwrap();
    assert_eq!(
        report,
        PullReport::Applied {
            inserted: 0,
            updated: 0
        }
    );
    assert_eq!(h.engine.list().await.unwrap(), imported);
}

#[tokio::test(flavor = "multi_thread")]
async fn pull_while_offline_is_stale_without_calls() {
    let h = offline();
    let report = h.engine.pull().await.unwrap();
    assert!(report.is_stale());
    assert!(h.gateway.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn pull_skips_meetings_with_upload_in_flight() {
    let h = online();
    h.engine.record_and_enqueue(RECORDING).await.unwrap();
    h.gateway.fail_next(
        Call::Upload,
        GatewayError::Unreachable("network down".to_string()),
    );
    h.engine.trigger_sync().await.unwrap();

    let report = h.engine.pull().await.unwrap();
    assert_eq!(
        report,
        PullReport::Applied {
            inserted: 0,
            updated: 0
        }
    );
    assert_eq!(h.engine.list().await.unwrap().len(), 1);

    h.engine.trigger_sync().await.unwrap();
    let meetings = h.engine.list().await.unwrap();
    assert_eq!(meetings.len(), 1);
    assert_eq!(meetings[0].remote_id.as_deref(), Some("R1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn pulled_status_never_moves_done_back_to_new() {
    let h = online();
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
    h.engine.trigger_sync().await.unwrap();

    h.gateway.update("R1", |record| record.status = RemoteStatus::Done);
    h.engine.pull().await.unwrap();
    assert_eq!(
        h.engine.get(&id).await.unwrap().unwrap().status,
        MeetingStatus::Done
    );

    h.gateway.update("R1", |record| record.status = RemoteStatus::New);
    h.engine.pull().await.unwrap();
    assert_eq!(
        h.engine.get(&id).await.unwrap().unwrap().status,
        MeetingStatus::Done
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn done_survives_processing_then_new_pulls() {
    let h = online();
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
    h.engine.trigger_sync().await.unwrap();

    h.gateway.update("R1", |record| record.status = RemoteStatus::Done);
    h.engine.pull().await.unwrap();

    for status in [RemoteStatus::Processing, RemoteStatus::New] {
        h.gateway.update("R1", |record| record.status = status);
        h.engine.pull().await.unwrap();
        let current = h.engine.get(&id).await.unwrap().unwrap().status;
        assert_ne!(current, MeetingStatus::New);
        assert_ne!(current, MeetingStatus::PendingSync);
        assert_eq!(current, MeetingStatus::Done);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn processing_without_optimism_keeps_acknowledged_status() {
    let db = Database::open_in_memory().unwrap();
    let policy = SyncPolicy {
        optimistic_processing: false,
        ..SyncPolicy::default()
    };
    let h = harness_with(db, NetworkStatus::unmetered(), policy);
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
    h.engine.trigger_sync().await.unwrap();

    h.engine
        .request_processing(&id, ProcessingOptions::default())
        .await
        .unwrap();
    assert_eq!(h.gateway.count(Call::Process), 1);
    assert_eq!(
        h.engine.get(&id).await.unwrap().unwrap().status,
        MeetingStatus::Processing
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn refresh_merges_single_meeting() {
    let h = online();
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
    h.engine.trigger_sync().await.unwrap();
    h.gateway.update("R1", |record| {
        record.language = Some("pt".to_string());
    });

    let report = h.engine.refresh(&id).await.unwrap();
    assert_eq!(
        report,
        PullReport::Applied {
            inserted: 0,
            updated: 1
        }
    );
    assert_eq!(h.gateway.count(Call::List), 0);
    assert_eq!(
        h.engine.get(&id).await.unwrap().unwrap().language.as_deref(),
        Some("pt")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn delete_removes_meeting_and_its_operations() {
    let h = offline();
    let kept = h.engine.record_and_enqueue("keep.m4a").await.unwrap();
    let dropped = h.engine.record_and_enqueue("drop.m4a").await.unwrap();

    assert!(h.engine.delete(&dropped).await.unwrap());
    assert!(!h.engine.delete(&dropped).await.unwrap());

    let queued = h.engine.pending_operations().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].meeting_id, kept);
    assert!(h.engine.get(&dropped).await.unwrap().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn trigger_during_drain_is_coalesced() {
    let h = online();
    h.engine.record_and_enqueue("a.m4a").await.unwrap();
    let pause = h.gateway.pause_uploads().await;

    let engine = h.engine.clone();
    let running = tokio::spawn(async move { engine.trigger_sync().await });
    h.gateway.wait_for(Call::Upload, 1).await;
    assert_eq!(h.engine.state(), SyncState::Syncing);

    h.engine.record_and_enqueue("b.m4a").await.unwrap();
    let report = h.engine.trigger_sync().await.unwrap();
    assert!(report.coalesced);
    assert_eq!(report.synced, 0);

    drop(pause);
    let report = running.await.unwrap().unwrap();
    assert!(!report.coalesced);
    assert_eq!(report.synced, 2);
    assert!(h.engine.pending_operations().await.unwrap().is_empty());
    assert_eq!(h.gateway.count(Call::Create), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn reconnect_drains_queue() {
    let h = offline();
    let id = h.engine.record_and_enqueue(RECORDING).await.unwrap();
    let listener = h.engine.spawn_connectivity_listener(h.network.subscribe());

    h.network.send(NetworkStatus::unmetered()).unwrap();
    let engine = h.engine.clone();
    eventually(|| {
        let engine = engine.clone();
        async move { engine.pending_operations().await.unwrap().is_empty() }
    })
    .await;

    assert_eq!(
        h.engine.get(&id).await.unwrap().unwrap().status,
        MeetingStatus::New
    );
    listener.abort();
}

#[tokio::test(flavor = "multi_thread")]
async fn state_changes_are_published() {
    let h = online();
    let mut states = h.engine.subscribe_state();
    h.engine.record_and_enqueue(RECORDING).await.unwrap();
    assert_eq!(*states.borrow_and_update(), SyncState::Pending);

    h.engine.trigger_sync().await.unwrap();
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SyncState::Synced);
}
