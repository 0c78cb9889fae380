//! Scripted in-memory backend for engine tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use desk_core::db::Database;
use desk_core::gateway::{GatewayError, RemoteGateway};
use desk_core::models::{CreatedRecord, ProcessingOptions, RemoteSnapshot, RemoteStatus};
use desk_core::sync::connectivity::{self, NetworkStatus, WatchConnectivity};
use desk_core::sync::SyncPolicy;
use desk_core::SyncEngine;
use tokio::sync::watch;

pub const SERVER_EPOCH_MS: i64 = 1_700_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Create,
    Upload,
    Fetch,
    Process,
    List,
}

#[derive(Default)]
struct Backend {
    created: u32,
    records: BTreeMap<String, RemoteSnapshot>,
    failures: HashMap<Call, VecDeque<GatewayError>>,
    calls: Vec<Call>,
}

/// Backend double whose failures are queued per call kind
#[derive(Clone, Default)]
pub struct FakeGateway {
    backend: Arc<Mutex<Backend>>,
    upload_pause: Arc<tokio::sync::Mutex<()>>,
}

impl FakeGateway {
    /// Make the next `call` fail with `error`
    pub fn fail_next(&self, call: Call, error: GatewayError) {
        self.backend
            .lock()
            .unwrap()
            .failures
            .entry(call)
            .or_default()
            .push_back(error);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.backend.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    /// Number of remote meetings ever created
    pub fn created(&self) -> u32 {
        self.backend.lock().unwrap().created
    }

    pub fn remote(&self, id: &str) -> Option<RemoteSnapshot> {
        self.backend.lock().unwrap().records.get(id).cloned()
    }

    /// Insert or replace a record held by the backend
    pub fn put(&self, snapshot: RemoteSnapshot) {
        self.backend
            .lock()
            .unwrap()
            .records
            .insert(snapshot.id.clone(), snapshot);
    }

    /// Change what the backend reports for an existing record
    pub fn update(&self, id: &str, change: impl FnOnce(&mut RemoteSnapshot)) {
        let mut backend = self.backend.lock().unwrap();
        let record = backend.records.get_mut(id).unwrap();
        change(record);
    }

    /// Block uploads until the returned guard is dropped
    pub async fn pause_uploads(&self) -> tokio::sync::OwnedMutexGuard<()> {
        Arc::clone(&self.upload_pause).lock_owned().await
    }

    /// Wait until `call` has been attempted at least `times` times
    pub async fn wait_for(&self, call: Call, times: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.count(call) < times {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn begin(&self, call: Call) -> Result<(), GatewayError> {
        let mut backend = self.backend.lock().unwrap();
        backend.calls.push(call);
        match backend.failures.get_mut(&call).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn with_record<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut RemoteSnapshot) -> T,
    ) -> Result<T, GatewayError> {
        let mut backend = self.backend.lock().unwrap();
        backend
            .records
            .get_mut(id)
            .map(f)
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                message: format!("meeting {id} not found"),
            })
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn create_record(&self) -> Result<CreatedRecord, GatewayError> {
        self.begin(Call::Create)?;
        let mut backend = self.backend.lock().unwrap();
        backend.created += 1;
        let remote_id = format!("R{}", backend.created);
        let created_at = SERVER_EPOCH_MS + i64::from(backend.created);
        backend.records.insert(
            remote_id.clone(),
            RemoteSnapshot {
                created_at: Some(created_at),
                ..RemoteSnapshot::bare(remote_id.clone(), RemoteStatus::New)
            },
        );
        Ok(CreatedRecord {
            remote_id,
            created_at,
        })
    }

    async fn upload_asset(
        &self,
        remote_id: &str,
        _recording_ref: &str,
    ) -> Result<RemoteStatus, GatewayError> {
        let outcome = self.begin(Call::Upload);
        let _pause = self.upload_pause.lock().await;
        outcome?;
        self.with_record(remote_id, |record| record.status)
    }

    async fn fetch_details(&self, remote_id: &str) -> Result<RemoteSnapshot, GatewayError> {
        self.begin(Call::Fetch)?;
        self.with_record(remote_id, |record| record.clone())
    }

    async fn request_processing(
        &self,
        remote_id: &str,
        _options: &ProcessingOptions,
    ) -> Result<RemoteStatus, GatewayError> {
        self.begin(Call::Process)?;
        self.with_record(remote_id, |record| {
            record.status = RemoteStatus::Processing;
            record.status
        })
    }

    async fn list_records(&self) -> Result<Vec<RemoteSnapshot>, GatewayError> {
        self.begin(Call::List)?;
        let backend = self.backend.lock().unwrap();
        Ok(backend
            .records
            .values()
            .map(|record| RemoteSnapshot {
                created_at: record.created_at,
                title: record.title.clone(),
                ..RemoteSnapshot::bare(record.id.clone(), record.status)
            })
            .collect())
    }
}

pub type TestEngine = SyncEngine<FakeGateway, WatchConnectivity>;

pub struct Harness {
    pub engine: TestEngine,
    pub gateway: FakeGateway,
    pub network: watch::Sender<NetworkStatus>,
}

pub fn harness_with(db: Database, status: NetworkStatus, policy: SyncPolicy) -> Harness {
    let gateway = FakeGateway::default();
    let (network, signal) = connectivity::channel(status);
    let engine = SyncEngine::new(db, gateway.clone(), signal, policy).unwrap();
    Harness {
        engine,
        gateway,
        network,
    }
}

pub fn online() -> Harness {
    harness_with(
        Database::open_in_memory().unwrap(),
        NetworkStatus::unmetered(),
        SyncPolicy::default(),
    )
}

pub fn offline() -> Harness {
    harness_with(
        Database::open_in_memory().unwrap(),
        NetworkStatus::offline(),
        SyncPolicy::default(),
    )
}

/// Poll `check` until it holds or five seconds pass
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}
