//! desk-core - Core library for DecisionDesk
//!
//! This crate contains the meeting models, the local SQLite record store and
//! operation queue, the reconciler, the remote gateway contract, and the sync
//! engine shared by every DecisionDesk client.

pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, ErrorKind, Result};
pub use models::{Meeting, MeetingId, MeetingStatus};
pub use state::SyncState;
pub use sync::SyncEngine;
