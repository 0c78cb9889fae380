//! Meeting record store

use crate::error::Result;
use crate::models::{Meeting, MeetingId, MeetingPatch};
use rusqlite::{params, Connection, OptionalExtension};

use super::conversion_error;

const MEETING_COLUMNS: &str = "id, remote_id, status, created_at, recording_ref, title, \
     duration_sec, transcript_text, language, cost_usd, cost_brl, minutes, sync_error, updated_at";

/// Trait for meeting storage operations
///
/// Every write is committed before the call returns.
pub trait MeetingRepository {
    /// Get a meeting by local ID
    fn get(&self, id: &MeetingId) -> Result<Option<Meeting>>;

    /// Get a meeting by the identity the backend assigned to it
    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Meeting>>;

    /// List all meetings, newest `created_at` first
    fn list(&self) -> Result<Vec<Meeting>>;

    /// Insert or fully replace a meeting, keyed by local ID
    fn upsert(&self, meeting: &Meeting) -> Result<()>;

    /// Apply a partial update; returns `None` (and writes nothing) if absent
    fn patch(&self, id: &MeetingId, patch: &MeetingPatch) -> Result<Option<Meeting>>;

    /// Remove a meeting; returns whether a row was deleted
    fn delete(&self, id: &MeetingId) -> Result<bool>;
}

/// `SQLite` implementation of `MeetingRepository`
pub struct SqliteMeetingRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMeetingRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a meeting from a database row
    fn parse_meeting(row: &rusqlite::Row<'_>) -> rusqlite::Result<Meeting> {
        let id: String = row.get(0)?;
        let status: String = row.get(2)?;
        Ok(Meeting {
            id: id.parse().map_err(|e| conversion_error(0, e))?,
            remote_id: row.get(1)?,
            status: status.parse().map_err(|e| conversion_error(2, e))?,
            created_at: row.get(3)?,
            recording_ref: row.get(4)?,
            title: row.get(5)?,
            duration_sec: row.get(6)?,
            transcript_text: row.get(7)?,
            language: row.get(8)?,
            cost_usd: row.get(9)?,
            cost_brl: row.get(10)?,
            minutes: row.get(11)?,
            sync_error: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }
}

impl MeetingRepository for SqliteMeetingRepository<'_> {
    fn get(&self, id: &MeetingId) -> Result<Option<Meeting>> {
        let meeting = self
            .conn
            .query_row(
                &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE id = ?"),
                params![id.as_str()],
                Self::parse_meeting,
            )
            .optional()?;
        Ok(meeting)
    }

    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Meeting>> {
        let meeting = self
            .conn
            .query_row(
                &format!("SELECT {MEETING_COLUMNS} FROM meetings WHERE remote_id = ?"),
                params![remote_id],
                Self::parse_meeting,
            )
            .optional()?;
        Ok(meeting)
    }

    fn list(&self) -> Result<Vec<Meeting>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings ORDER BY created_at DESC, id DESC"
        ))?;

        let meetings = stmt
            .query_map([], Self::parse_meeting)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(meetings)
    }

    fn upsert(&self, meeting: &Meeting) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meetings (
                id, remote_id, status, created_at, recording_ref, title, duration_sec,
                transcript_text, language, cost_usd, cost_brl, minutes, sync_error, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                remote_id = excluded.remote_id,
                status = excluded.status,
                created_at = excluded.created_at,
                recording_ref = excluded.recording_ref,
                title = excluded.title,
                duration_sec = excluded.duration_sec,
                transcript_text = excluded.transcript_text,
                language = excluded.language,
                cost_usd = excluded.cost_usd,
                cost_brl = excluded.cost_brl,
                minutes = excluded.minutes,
                sync_error = excluded.sync_error,
                updated_at = excluded.updated_at",
            params![
                meeting.id.as_str(),
                meeting.remote_id,
                meeting.status.as_str(),
                meeting.created_at,
                meeting.recording_ref,
                meeting.title,
                meeting.duration_sec,
                meeting.transcript_text,
                meeting.language,
                meeting.cost_usd,
                meeting.cost_brl,
                meeting.minutes,
                meeting.sync_error,
                meeting.updated_at,
            ],
        )?;
        Ok(())
    }

    fn patch(&self, id: &MeetingId, patch: &MeetingPatch) -> Result<Option<Meeting>> {
        let Some(mut meeting) = self.get(id)? else {
            return Ok(None);
        };
        if patch.is_empty() {
            return Ok(Some(meeting));
        }

        patch.apply_to(&mut meeting);
        meeting.updated_at = crate::util::unix_millis_now();
        self.upsert(&meeting)?;
        Ok(Some(meeting))
    }

    fn delete(&self, id: &MeetingId) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM meetings WHERE id = ?", params![id.as_str()])?;
        Ok(rows > 0)
    }
}
