//! Durable FIFO of outbound sync operations

use std::collections::HashSet;

use crate::error::Result;
use crate::models::{MeetingId, Operation, OperationId, OperationPayload};
use crate::util::unix_millis_now;
use rusqlite::{params, Connection, OptionalExtension};

use super::conversion_error;

/// Trait for the persistent operation queue.
///
/// Operations come back in enqueue order and stay queued until removed.
pub trait OperationQueue {
    /// Append an operation; returns its newly assigned sequence number
    fn enqueue(&self, meeting_id: &MeetingId, payload: &OperationPayload) -> Result<OperationId>;

    /// The operation with the lowest sequence number, without removing it
    fn peek_oldest(&self) -> Result<Option<Operation>>;

    /// Get a queued operation by ID
    fn get(&self, id: OperationId) -> Result<Option<Operation>>;

    /// Replace the payload of a queued operation in place
    fn update_payload(&self, id: OperationId, payload: &OperationPayload) -> Result<bool>;

    /// Delete one operation; removing an absent ID is a no-op
    fn remove(&self, id: OperationId) -> Result<bool>;

    /// Delete every operation targeting a meeting; returns how many went
    fn remove_for_meeting(&self, meeting_id: &MeetingId) -> Result<usize>;

    /// Every queued operation, oldest first
    fn list_all(&self) -> Result<Vec<Operation>>;

    /// Number of queued operations
    fn len(&self) -> Result<usize>;

    /// Whether the queue is empty
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Remote identities held by partially completed uploads
    fn checkpointed_remote_ids(&self) -> Result<HashSet<String>>;
}

/// `SQLite` implementation of `OperationQueue`
pub struct SqliteOperationQueue<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteOperationQueue<'a> {
    /// Create a new queue view over the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_operation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Operation> {
        let meeting_id: String = row.get(1)?;
        let payload: String = row.get(2)?;
        Ok(Operation {
            id: OperationId(row.get(0)?),
            meeting_id: meeting_id.parse().map_err(|e| conversion_error(1, e))?,
            payload: serde_json::from_str(&payload).map_err(|e| conversion_error(2, e))?,
            enqueued_at: row.get(3)?,
        })
    }
}

impl OperationQueue for SqliteOperationQueue<'_> {
    fn enqueue(&self, meeting_id: &MeetingId, payload: &OperationPayload) -> Result<OperationId> {
        let json = serde_json::to_string(payload)?;
        self.conn.execute(
            "INSERT INTO sync_queue (meeting_id, kind, payload, enqueued_at) VALUES (?, ?, ?, ?)",
            params![meeting_id.as_str(), payload.kind(), json, unix_millis_now()],
        )?;
        let id = OperationId(self.conn.last_insert_rowid());
        tracing::debug!("Enqueued {} operation {id} for meeting {meeting_id}", payload.kind());
        Ok(id)
    }

    fn peek_oldest(&self) -> Result<Option<Operation>> {
        let operation = self
            .conn
            .query_row(
                "SELECT id, meeting_id, payload, enqueued_at FROM sync_queue ORDER BY id ASC LIMIT 1",
                [],
                Self::parse_operation,
            )
            .optional()?;
        Ok(operation)
    }

    fn get(&self, id: OperationId) -> Result<Option<Operation>> {
        let operation = self
            .conn
            .query_row(
                "SELECT id, meeting_id, payload, enqueued_at FROM sync_queue WHERE id = ?",
                params![id.0],
                Self::parse_operation,
            )
            .optional()?;
        Ok(operation)
    }

    fn update_payload(&self, id: OperationId, payload: &OperationPayload) -> Result<bool> {
        let json = serde_json::to_string(payload)?;
        let rows = self.conn.execute(
            "UPDATE sync_queue SET kind = ?, payload = ? WHERE id = ?",
            params![payload.kind(), json, id.0],
        )?;
        Ok(rows > 0)
    }

    fn remove(&self, id: OperationId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM sync_queue WHERE id = ?", params![id.0])?;
        Ok(rows > 0)
    }

    fn remove_for_meeting(&self, meeting_id: &MeetingId) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM sync_queue WHERE meeting_id = ?",
            params![meeting_id.as_str()],
        )?;
        Ok(rows)
    }

    fn list_all(&self) -> Result<Vec<Operation>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, meeting_id, payload, enqueued_at FROM sync_queue ORDER BY id ASC")?;

        let operations = stmt
            .query_map([], Self::parse_operation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(operations)
    }

    fn len(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sync_queue", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn checkpointed_remote_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter_map(|op| op.payload.checkpoint().map(|c| c.remote_id.clone()))
            .collect())
    }
}
