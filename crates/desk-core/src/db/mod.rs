//! Database layer for DecisionDesk

mod connection;
mod meeting_repository;
mod migrations;
mod queue_repository;

pub use connection::Database;
pub use meeting_repository::{MeetingRepository, SqliteMeetingRepository};
pub use queue_repository::{OperationQueue, SqliteOperationQueue};

/// Wrap a column parse failure so it surfaces as a storage error
pub(crate) fn conversion_error(
    column: usize,
    error: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(error))
}
