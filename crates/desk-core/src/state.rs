//! Shared cross-client sync state.

/// Unified sync state published by the engine to desktop, mobile and CLI.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SyncState {
    /// The connectivity gate is closed; nothing is sent.
    #[default]
    Offline,
    /// A drain is walking the operation queue.
    Syncing,
    /// The last drain emptied the queue.
    Synced,
    /// The last drain halted on a transient failure; operations remain queued.
    Pending,
    /// The last drain aborted on a storage failure.
    Error,
}

impl SyncState {
    /// Short lowercase label for status lines.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }
}
