//! The sync engine: owner of the record store and the operation queue.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use super::connectivity::{ConnectivitySignal, NetworkStatus};
use super::reconcile::reconcile;
use super::report::{DrainReport, HaltReason, PullReport};
use super::{transitions, SyncPolicy};
use crate::db::{
    Database, MeetingRepository, OperationQueue, SqliteMeetingRepository, SqliteOperationQueue,
};
use crate::error::{Error, Result};
use crate::gateway::{GatewayError, RemoteGateway};
use crate::models::{
    CreatedRecord, Meeting, MeetingId, MeetingPatch, MeetingStatus, Operation, OperationId,
    OperationPayload, ProcessingOptions, RemoteSnapshot, RemoteStatus,
};
use crate::state::SyncState;
use crate::util::{normalize_text_option, unix_millis_now};

/// Thread-safe handle to the sync engine.
///
/// Clones share the same store, queue and drain lock. At most one drain runs
/// at a time; triggers that arrive during a drain are folded into one more
/// pass once it finishes.
pub struct SyncEngine<G, C> {
    inner: Arc<Inner<G, C>>,
}

impl<G, C> Clone for SyncEngine<G, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<G, C> {
    db: Mutex<Database>,
    gateway: G,
    connectivity: C,
    policy: SyncPolicy,
    /// Held for the whole of a drain or a pull
    sync_lock: Mutex<()>,
    drain_requested: AtomicBool,
    state: watch::Sender<SyncState>,
}

/// What a remote call accomplished, applied to the store afterwards
enum Outcome {
    Uploaded {
        created: CreatedRecord,
        status: RemoteStatus,
    },
    ProcessingAccepted {
        status: RemoteStatus,
    },
    /// The operation can no longer apply to its meeting
    Obsolete(&'static str),
}

impl<G: RemoteGateway, C: ConnectivitySignal> SyncEngine<G, C> {
    /// Take ownership of an opened database and wire the collaborators.
    pub fn new(db: Database, gateway: G, connectivity: C, policy: SyncPolicy) -> Result<Self> {
        let queued = SqliteOperationQueue::new(db.connection()).len()?;
        let initial = if !connectivity.current().is_usable(policy.allow_metered) {
            SyncState::Offline
        } else if queued > 0 {
            SyncState::Pending
        } else {
            SyncState::Synced
        };
        let (state, _) = watch::channel(initial);

        Ok(Self {
            inner: Arc::new(Inner {
                db: Mutex::new(db),
                gateway,
                connectivity,
                policy,
                sync_lock: Mutex::new(()),
                drain_requested: AtomicBool::new(false),
                state,
            }),
        })
    }

    pub fn gateway(&self) -> &G {
        &self.inner.gateway
    }

    pub fn policy(&self) -> SyncPolicy {
        self.inner.policy
    }

    /// Latest published sync state
    pub fn state(&self) -> SyncState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every sync state change
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    // -----------------------------------------------------------------------
    // Capture and reads
    // -----------------------------------------------------------------------

    /// Store a freshly captured meeting and queue its upload in one commit.
    pub async fn record_and_enqueue(&self, recording_ref: impl Into<String>) -> Result<MeetingId> {
        let recording_ref = normalize_text_option(Some(recording_ref.into())).ok_or_else(|| {
            Error::InvalidInput("recording reference must not be empty".to_string())
        })?;
        let meeting = Meeting::captured(recording_ref.clone());

        let op_id = {
            let db = self.inner.db.lock().await;
            let tx = db.connection().unchecked_transaction()?;
            SqliteMeetingRepository::new(&tx).upsert(&meeting)?;
            let op_id = SqliteOperationQueue::new(&tx)
                .enqueue(&meeting.id, &OperationPayload::upload(recording_ref))?;
            tx.commit()?;
            op_id
        };

        tracing::info!("Captured meeting {} (upload {op_id})", meeting.id);
        self.publish_if(SyncState::Synced, SyncState::Pending);
        Ok(meeting.id)
    }

    /// All meetings, newest first. Never touches the network.
    pub async fn list(&self) -> Result<Vec<Meeting>> {
        let db = self.inner.db.lock().await;
        SqliteMeetingRepository::new(db.connection()).list()
    }

    pub async fn get(&self, id: &MeetingId) -> Result<Option<Meeting>> {
        let db = self.inner.db.lock().await;
        SqliteMeetingRepository::new(db.connection()).get(id)
    }

    /// Operations still waiting to reach the backend, oldest first
    pub async fn pending_operations(&self) -> Result<Vec<Operation>> {
        let db = self.inner.db.lock().await;
        SqliteOperationQueue::new(db.connection()).list_all()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Queue a processing request for a synced meeting, then drain.
    ///
    /// Fails with a precondition error if the meeting has no remote identity.
    pub async fn request_processing(
        &self,
        id: &MeetingId,
        options: ProcessingOptions,
    ) -> Result<OperationId> {
        let op_id = {
            let db = self.inner.db.lock().await;
            let meeting = require_meeting(&db, id)?;
            if meeting.remote_id.is_none() {
                return Err(Error::Precondition(format!(
                    "meeting {id} has not been accepted by the backend yet"
                )));
            }
            SqliteOperationQueue::new(db.connection())
                .enqueue(id, &OperationPayload::RequestProcessing { options })?
        };

        tracing::info!(
            "Queued processing request {op_id} for meeting {id} ({}, {})",
            options.provider,
            options.model
        );
        self.trigger_sync().await?;
        Ok(op_id)
    }

    /// Re-queue the upload of a meeting the backend rejected before accepting it.
    pub async fn retry(&self, id: &MeetingId) -> Result<OperationId> {
        let db = self.inner.db.lock().await;
        let meeting = require_meeting(&db, id)?;
        let recording_ref = match (&meeting.status, &meeting.remote_id, &meeting.recording_ref) {
            (MeetingStatus::Error, None, Some(recording_ref)) => recording_ref.clone(),
            (MeetingStatus::Error, None, None) => {
                return Err(Error::Precondition(format!(
                    "meeting {id} has no local recording to upload"
                )));
            }
            _ => {
                return Err(Error::Precondition(format!(
                    "only meetings whose upload was rejected can be retried ({id} is {})",
                    meeting.status
                )));
            }
        };

        let tx = db.connection().unchecked_transaction()?;
        SqliteMeetingRepository::new(&tx).patch(
            id,
            &MeetingPatch {
                status: Some(MeetingStatus::PendingSync),
                sync_error: Some(None),
                ..MeetingPatch::default()
            },
        )?;
        let op_id =
            SqliteOperationQueue::new(&tx).enqueue(id, &OperationPayload::upload(recording_ref))?;
        tx.commit()?;
        drop(db);

        tracing::info!("Re-queued upload {op_id} for meeting {id}");
        self.publish_if(SyncState::Synced, SyncState::Pending);
        Ok(op_id)
    }

    /// Remove a meeting and every operation queued for it.
    ///
    /// Returns whether the meeting existed.
    pub async fn delete(&self, id: &MeetingId) -> Result<bool> {
        let db = self.inner.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let dropped = SqliteOperationQueue::new(&tx).remove_for_meeting(id)?;
        let existed = SqliteMeetingRepository::new(&tx).delete(id)?;
        tx.commit()?;

        if existed {
            tracing::info!("Deleted meeting {id} ({dropped} queued operations dropped)");
        }
        Ok(existed)
    }

    // -----------------------------------------------------------------------
    // Drain
    // -----------------------------------------------------------------------

    /// Walk the queue in order until it is empty, the gate closes, or a
    /// remote call fails without a definitive answer.
    ///
    /// If a drain is already running the request is recorded and this call
    /// returns immediately with `coalesced` set.
    pub async fn trigger_sync(&self) -> Result<DrainReport> {
        self.inner.drain_requested.store(true, Ordering::SeqCst);
        let mut report = DrainReport::default();
        let mut ran = false;

        loop {
            let Ok(guard) = self.inner.sync_lock.try_lock() else {
                if ran {
                    return Ok(report);
                }
                tracing::debug!("Sync already in progress; trigger coalesced");
                return Ok(DrainReport::coalesced());
            };

            while self.inner.drain_requested.swap(false, Ordering::SeqCst) {
                ran = true;
                match self.drain_pass().await {
                    Ok(pass) => report.absorb(pass),
                    Err(error) => {
                        tracing::error!("Drain aborted: {error}");
                        self.publish(SyncState::Error);
                        return Err(error);
                    }
                }
            }
            drop(guard);

            // A trigger may have landed between the last pass and the unlock
            if !self.inner.drain_requested.load(Ordering::SeqCst) {
                return Ok(report);
            }
        }
    }

    async fn drain_pass(&self) -> Result<DrainReport> {
        self.publish(SyncState::Syncing);
        let mut report = DrainReport::default();

        loop {
            if !self.gate_open() {
                report.halted = Some(HaltReason::Offline);
                self.publish(SyncState::Offline);
                break;
            }

            let next = {
                let db = self.inner.db.lock().await;
                next_operation(&db)?
            };
            let Some((operation, meeting)) = next else {
                self.publish(SyncState::Synced);
                break;
            };
            let Some(meeting) = meeting else {
                self.discard(&operation, "meeting no longer exists").await?;
                report.discarded += 1;
                continue;
            };

            tracing::debug!(
                "Running {} operation {} for meeting {}",
                operation.payload.kind(),
                operation.id,
                operation.meeting_id
            );
            match self.execute(&operation, &meeting).await {
                Ok(Outcome::Obsolete(reason)) => {
                    self.discard(&operation, reason).await?;
                    report.discarded += 1;
                }
                Ok(outcome) => {
                    if self.apply_success(&operation, outcome).await? {
                        report.synced += 1;
                    } else {
                        report.discarded += 1;
                    }
                }
                Err(Error::Gateway(error)) if error.is_retryable() => {
                    tracing::warn!(
                        "Operation {} halted, will retry on next trigger: {error}",
                        operation.id
                    );
                    report.halted = Some(HaltReason::Transient(error.to_string()));
                    self.publish(SyncState::Pending);
                    break;
                }
                Err(Error::Gateway(error)) => {
                    self.apply_rejection(&operation, &error).await?;
                    report.rejected += 1;
                }
                Err(error) => return Err(error),
            }
        }

        tracing::info!(
            "Drain finished: {} synced, {} discarded, {} rejected{}",
            report.synced,
            report.discarded,
            report.rejected,
            report
                .halted
                .as_ref()
                .map_or_else(String::new, |reason| format!(", halted ({reason})"))
        );
        Ok(report)
    }

    async fn execute(&self, operation: &Operation, meeting: &Meeting) -> Result<Outcome> {
        let gateway = &self.inner.gateway;
        match &operation.payload {
            OperationPayload::Upload {
                recording_ref,
                checkpoint,
            } => {
                let created = match (checkpoint, &meeting.remote_id) {
                    (Some(checkpoint), _) => checkpoint.clone(),
                    (None, Some(remote_id)) => CreatedRecord {
                        remote_id: remote_id.clone(),
                        created_at: meeting.created_at,
                    },
                    (None, None) => {
                        let created = gateway.create_record().await?;
                        self.checkpoint_upload(operation.id, recording_ref, &created)
                            .await?;
                        created
                    }
                };
                let status = gateway
                    .upload_asset(&created.remote_id, recording_ref)
                    .await?;
                Ok(Outcome::Uploaded { created, status })
            }
            OperationPayload::RequestProcessing { options } => {
                let Some(remote_id) = meeting.remote_id.as_deref() else {
                    return Ok(Outcome::Obsolete("meeting has no remote identity"));
                };
                let status = gateway.request_processing(remote_id, options).await?;
                Ok(Outcome::ProcessingAccepted { status })
            }
        }
    }

    /// Persist the remote identity so a failed upload does not create twice
    async fn checkpoint_upload(
        &self,
        id: OperationId,
        recording_ref: &str,
        created: &CreatedRecord,
    ) -> Result<()> {
        let db = self.inner.db.lock().await;
        SqliteOperationQueue::new(db.connection()).update_payload(
            id,
            &OperationPayload::Upload {
                recording_ref: recording_ref.to_string(),
                checkpoint: Some(created.clone()),
            },
        )?;
        tracing::debug!("Checkpointed remote meeting {} for {id}", created.remote_id);
        Ok(())
    }

    /// Apply the acknowledged result and dequeue in one commit.
    ///
    /// Returns `false` if the meeting was deleted while the call was in flight.
    async fn apply_success(&self, operation: &Operation, outcome: Outcome) -> Result<bool> {
        let optimistic = self.inner.policy.optimistic_processing;
        let db = self.inner.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let meetings = SqliteMeetingRepository::new(&tx);
        let queue = SqliteOperationQueue::new(&tx);

        let Some(current) = meetings.get(&operation.meeting_id)? else {
            queue.remove(operation.id)?;
            tx.commit()?;
            return Ok(false);
        };
        let patch = match outcome {
            Outcome::Uploaded { created, status } => transitions::upload_accepted(&created, status),
            Outcome::ProcessingAccepted { status } => {
                transitions::processing_accepted(current.status, status, optimistic)
            }
            Outcome::Obsolete(_) => MeetingPatch::default(),
        };
        meetings.patch(&operation.meeting_id, &patch)?;
        queue.remove(operation.id)?;
        tx.commit()?;
        Ok(true)
    }

    /// Drop a refused operation and mark its meeting as failed, in one commit
    async fn apply_rejection(&self, operation: &Operation, error: &GatewayError) -> Result<()> {
        let db = self.inner.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let queue = SqliteOperationQueue::new(&tx);
        let orphan = queue
            .get(operation.id)?
            .and_then(|stored| stored.payload.checkpoint().cloned());
        queue.remove(operation.id)?;
        SqliteMeetingRepository::new(&tx)
            .patch(&operation.meeting_id, &transitions::rejected(&error.to_string()))?;
        tx.commit()?;

        tracing::warn!(
            "Operation {} for meeting {} rejected by backend: {error}",
            operation.id,
            operation.meeting_id
        );
        if let Some(orphan) = orphan {
            tracing::warn!(
                "Remote meeting {} was created but never received audio",
                orphan.remote_id
            );
        }
        Ok(())
    }

    async fn discard(&self, operation: &Operation, reason: &str) -> Result<()> {
        let db = self.inner.db.lock().await;
        SqliteOperationQueue::new(db.connection()).remove(operation.id)?;
        tracing::debug!("Discarded operation {}: {reason}", operation.id);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    /// Fetch the backend's meetings and merge them into the store.
    ///
    /// Any fetch failure leaves the store untouched and reports stale data.
    pub async fn pull(&self) -> Result<PullReport> {
        if !self.gate_open() {
            return Ok(stale("offline"));
        }

        let guard = self.inner.sync_lock.lock().await;
        let result = self.pull_locked().await;
        drop(guard);

        self.resume_requested_drain().await?;
        result
    }

    async fn pull_locked(&self) -> Result<PullReport> {
        let gateway = &self.inner.gateway;
        let summaries = match gateway.list_records().await {
            Ok(summaries) => summaries,
            Err(error) => return Ok(stale(&error.to_string())),
        };

        let mut snapshots = Vec::with_capacity(summaries.len());
        for summary in summaries {
            match gateway.fetch_details(&summary.id).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(error) => {
                    return Ok(stale(&format!("meeting {}: {error}", summary.id)));
                }
            }
        }

        let report = {
            let db = self.inner.db.lock().await;
            apply_snapshots(&db, &snapshots)?
        };
        if let PullReport::Applied { inserted, updated } = &report {
            tracing::info!(
                "Pulled {} remote meetings: {inserted} inserted, {updated} updated",
                snapshots.len()
            );
        }
        Ok(report)
    }

    /// Fetch and merge a single synced meeting.
    pub async fn refresh(&self, id: &MeetingId) -> Result<PullReport> {
        let remote_id = {
            let db = self.inner.db.lock().await;
            require_meeting(&db, id)?.remote_id.ok_or_else(|| {
                Error::Precondition(format!(
                    "meeting {id} has not been accepted by the backend yet"
                ))
            })?
        };
        if !self.gate_open() {
            return Ok(stale("offline"));
        }

        let guard = self.inner.sync_lock.lock().await;
        let result = match self.inner.gateway.fetch_details(&remote_id).await {
            Ok(snapshot) => {
                let db = self.inner.db.lock().await;
                apply_snapshots(&db, std::slice::from_ref(&snapshot))
            }
            Err(error) => Ok(stale(&error.to_string())),
        };
        drop(guard);

        self.resume_requested_drain().await?;
        result
    }

    async fn resume_requested_drain(&self) -> Result<()> {
        if self.inner.drain_requested.load(Ordering::SeqCst) {
            self.trigger_sync().await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Background tasks
    // -----------------------------------------------------------------------

    /// Drain whenever the watched connectivity becomes usable.
    ///
    /// Also drains once at start if the link is already usable.
    pub fn spawn_connectivity_listener(
        &self,
        mut status: watch::Receiver<NetworkStatus>,
    ) -> JoinHandle<()> {
        let engine = self.clone();
        let allow_metered = self.inner.policy.allow_metered;
        tokio::spawn(async move {
            let mut was_usable = false;
            loop {
                let usable = status.borrow_and_update().is_usable(allow_metered);
                if usable && !was_usable {
                    tracing::info!("Connectivity available; draining sync queue");
                    if let Err(error) = engine.trigger_sync().await {
                        tracing::error!("Sync after reconnect failed: {error}");
                    }
                } else if !usable && was_usable {
                    tracing::info!("Connectivity lost; sync paused");
                    engine.publish_if(SyncState::Synced, SyncState::Offline);
                    engine.publish_if(SyncState::Pending, SyncState::Offline);
                }
                was_usable = usable;

                if status.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    /// Pull the backend's view every `interval`
    pub fn spawn_periodic_pull(&self, interval: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(error) = engine.pull().await {
                    tracing::error!("Periodic pull failed: {error}");
                }
            }
        })
    }

    // -----------------------------------------------------------------------
    // Private
    // -----------------------------------------------------------------------

    fn gate_open(&self) -> bool {
        self.inner
            .connectivity
            .current()
            .is_usable(self.inner.policy.allow_metered)
    }

    fn publish(&self, next: SyncState) {
        self.inner.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }

    fn publish_if(&self, expected: SyncState, next: SyncState) {
        self.inner.state.send_if_modified(|current| {
            if *current == expected {
                *current = next;
                true
            } else {
                false
            }
        });
    }
}

fn require_meeting(db: &Database, id: &MeetingId) -> Result<Meeting> {
    SqliteMeetingRepository::new(db.connection())
        .get(id)?
        .ok_or_else(|| Error::NotFound(id.to_string()))
}

/// Head of the queue together with the meeting it targets, if still present
fn next_operation(db: &Database) -> Result<Option<(Operation, Option<Meeting>)>> {
    let Some(operation) = SqliteOperationQueue::new(db.connection()).peek_oldest()? else {
        return Ok(None);
    };
    let meeting = SqliteMeetingRepository::new(db.connection()).get(&operation.meeting_id)?;
    Ok(Some((operation, meeting)))
}

/// Reconcile every snapshot in one commit.
///
/// Meetings whose upload is still in flight (checkpointed but not yet
/// acknowledged) are skipped so they do not appear twice.
fn apply_snapshots(db: &Database, snapshots: &[RemoteSnapshot]) -> Result<PullReport> {
    let tx = db.connection().unchecked_transaction()?;
    let meetings = SqliteMeetingRepository::new(&tx);
    let in_flight = SqliteOperationQueue::new(&tx).checkpointed_remote_ids()?;
    let now = unix_millis_now();
    let mut inserted = 0;
    let mut updated = 0;

    for snapshot in snapshots {
        if in_flight.contains(&snapshot.id) {
            tracing::debug!("Skipping remote meeting {} with upload in flight", snapshot.id);
            continue;
        }
        let local = meetings.find_by_remote_id(&snapshot.id)?;
        let mut merged = reconcile(local.as_ref(), snapshot);
        if local.as_ref() == Some(&merged) {
            continue;
        }
        merged.updated_at = now;
        meetings.upsert(&merged)?;
        if local.is_some() {
            updated += 1;
        } else {
            inserted += 1;
        }
    }

    tx.commit()?;
    Ok(PullReport::Applied { inserted, updated })
}

fn stale(reason: &str) -> PullReport {
    tracing::warn!("Pull failed, stale data retained: {reason}");
    PullReport::Stale {
        reason: reason.to_string(),
    }
}
