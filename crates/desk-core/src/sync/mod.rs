//! Local-first sync engine.
//!
//! Captures land in the record store and the operation queue before any
//! network call. [`SyncEngine::trigger_sync`] walks the queue against the
//! [`RemoteGateway`](crate::gateway::RemoteGateway) one operation at a time and
//! [`SyncEngine::pull`] merges the backend's view back through [`reconcile`].

pub mod connectivity;
mod engine;
mod reconcile;
mod report;
pub mod transitions;

pub use connectivity::{ConnectivitySignal, NetworkStatus, Transport, WatchConnectivity};
pub use engine::SyncEngine;
pub use reconcile::reconcile;
pub use report::{DrainReport, HaltReason, PullReport};

/// Behaviour switches for the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Let metered links open the connectivity gate
    pub allow_metered: bool,
    /// Show `Processing` as soon as a processing request is accepted
    pub optimistic_processing: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            allow_metered: false,
            optimistic_processing: true,
        }
    }
}
