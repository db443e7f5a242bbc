use rusqlite::backup::Backup;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::checklist;
use crate::models::{NewSession, NoteEntry, PomodoroSession, TaskItem, TaskStatus};
use crate::utils;

/// Schema version this build migrates databases up to
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
    #[error("Failed to serialize setting: {0}")]
    SerializeError(#[from] serde_json::Error),
}

/// A forward-only schema step
struct Migration {
    version: i64,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: "
        CREATE TABLE IF NOT EXISTS note_entries (
            date            TEXT PRIMARY KEY,
            content         TEXT NOT NULL,
            updated_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS task_items (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            date            TEXT NOT NULL,
            text            TEXT NOT NULL,
            status          TEXT NOT NULL DEFAULT 'undone'
        );

        CREATE TABLE IF NOT EXISTS pomodoro_sessions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            start_time      TEXT NOT NULL,
            duration        INTEGER NOT NULL,
            break_duration  INTEGER NOT NULL,
            linked_type     TEXT NOT NULL,
            linked_id       TEXT
        );

        CREATE TABLE IF NOT EXISTS settings (
            key             TEXT PRIMARY KEY,
            value           TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_task_items_date ON task_items(date);
        CREATE INDEX IF NOT EXISTS idx_pomodoro_start_time ON pomodoro_sessions(start_time);

        CREATE VIRTUAL TABLE IF NOT EXISTS note_fts
            USING fts5(date, content, content='note_entries', content_rowid='rowid');

        CREATE TRIGGER IF NOT EXISTS note_entries_ai AFTER INSERT ON note_entries BEGIN
            INSERT INTO note_fts(rowid, date, content) VALUES (new.rowid, new.date, new.content);
        END;

        CREATE TRIGGER IF NOT EXISTS note_entries_ad AFTER DELETE ON note_entries BEGIN
            INSERT INTO note_fts(note_fts, rowid, date, content)
                VALUES ('delete', old.rowid, old.date, old.content);
        END;

        CREATE TRIGGER IF NOT EXISTS note_entries_au AFTER UPDATE ON note_entries BEGIN
            INSERT INTO note_fts(note_fts, rowid, date, content)
                VALUES ('delete', old.rowid, old.date, old.content);
            INSERT INTO note_fts(rowid, date, content) VALUES (new.rowid, new.date, new.content);
        END;
    ",
}];

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database file and bring its schema up to date
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let db_path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DatabaseError::DirectoryError(e.to_string()))?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn)
    }

    /// In-memory database with the full schema, mostly for tests
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Database { conn };
        db.ensure_schema()?;
        Ok(db)
    }

    /// Read the stored schema version and apply every newer migration.
    ///
    /// Each step runs in its own transaction together with the version bump,
    /// so a failed step leaves the previous version in place.
    fn ensure_schema(&self) -> Result<(), DatabaseError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
            [],
        )?;

        let current = self.schema_version()?;
        if current.is_none() {
            self.conn.execute("INSERT INTO schema_version (version) VALUES (0)", [])?;
        }
        let current = current.unwrap_or(0);

        for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
            info!(from = current, to = migration.version, "Applying schema migration");
            let tx = self.conn.unchecked_transaction()?;
            tx.execute_batch(migration.sql)?;
            tx.execute(
                "UPDATE schema_version SET version = ?1",
                params![migration.version],
            )?;
            tx.commit()?;
        }

        Ok(())
    }

    /// Stored schema version, `None` when the version row is missing
    pub fn schema_version(&self) -> Result<Option<i64>, DatabaseError> {
        let version = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get("version")
            })
            .optional()?;
        Ok(version)
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // ---- notes ----

    /// Insert a note or overwrite the content of the existing note for `date`.
    /// The search index is updated by triggers inside the same transaction.
    pub fn upsert_note(&self, date: &str, content: &str) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        upsert_note_in(&tx, date, content)?;
        tx.commit()?;
        debug!(date, "Saved note");
        Ok(())
    }

    fn row_to_note(row: &rusqlite::Row) -> Result<NoteEntry, rusqlite::Error> {
        Ok(NoteEntry {
            date: row.get("date")?,
            content: row.get("content")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Get the note for an exact date
    pub fn fetch_note(&self, date: &str) -> Result<Option<NoteEntry>, DatabaseError> {
        let note = self
            .conn
            .query_row(
                "SELECT date, content, updated_at FROM note_entries WHERE date = ?1",
                params![date],
                Self::row_to_note,
            )
            .optional()?;
        Ok(note)
    }

    /// Full-text search over notes, newest date first.
    ///
    /// A query FTS5 cannot parse is retried with every word quoted; if FTS5
    /// rejects that as well the result is empty. Any other failure, such as a
    /// missing index table, is returned.
    pub fn search_notes(&self, query: &str) -> Result<Vec<NoteEntry>, DatabaseError> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        match self.run_search(query) {
            Ok(notes) => Ok(notes),
            Err(e) if is_query_error(&e) => {
                let escaped = escape_fts5_query(query);
                warn!(query, error = %e, "Search query rejected, retrying as literal words");
                match self.run_search(&escaped) {
                    Ok(notes) => Ok(notes),
                    Err(e) if is_fts5_error(&e) => Ok(Vec::new()),
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn run_search(&self, fts_query: &str) -> Result<Vec<NoteEntry>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT n.date, n.content, n.updated_at
             FROM note_fts
             JOIN note_entries n ON n.rowid = note_fts.rowid
             WHERE note_fts MATCH ?1
             ORDER BY n.date DESC",
        )?;
        stmt.query_map(params![fts_query], Self::row_to_note)?
            .collect::<Result<Vec<_>, _>>()
    }

    /// All notes, or only those in the inclusive range when both bounds are given,
    /// ordered by date DESC
    pub fn list_notes(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Vec<NoteEntry>, DatabaseError> {
        if let (Some(start), Some(end)) = (start_date, end_date) {
            let mut stmt = self.conn.prepare(
                "SELECT date, content, updated_at FROM note_entries
                 WHERE date BETWEEN ?1 AND ?2 ORDER BY date DESC",
            )?;
            let notes = stmt
                .query_map(params![start, end], Self::row_to_note)?
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(notes);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT date, content, updated_at FROM note_entries ORDER BY date DESC")?;
        let notes = stmt
            .query_map([], Self::row_to_note)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(notes)
    }

    /// Rebuild the full-text index from `note_entries`
    pub fn rebuild_search_index(&self) -> Result<(), DatabaseError> {
        self.conn
            .execute("INSERT INTO note_fts(note_fts) VALUES ('rebuild')", [])?;
        info!("Rebuilt note search index");
        Ok(())
    }

    // ---- tasks ----

    /// Replace the whole task list of a date in one transaction
    pub fn replace_tasks_for_date(
        &self,
        date: &str,
        tasks: &[(String, TaskStatus)],
    ) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        replace_tasks_in(&tx, date, tasks)?;
        tx.commit()?;
        debug!(date, count = tasks.len(), "Replaced tasks");
        Ok(())
    }

    /// Tasks of a date in insertion order
    pub fn list_tasks_for_date(&self, date: &str) -> Result<Vec<TaskItem>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, text, status FROM task_items WHERE date = ?1 ORDER BY id ASC",
        )?;
        let tasks = stmt
            .query_map(params![date], |row| {
                Ok(TaskItem {
                    id: row.get("id")?,
                    date: row.get("date")?,
                    text: row.get("text")?,
                    status: row.get("status")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    /// Re-derive a date's tasks from the checklist lines of its stored note.
    /// A missing note clears the date's tasks.
    pub fn sync_tasks_from_note(&self, date: &str) -> Result<usize, DatabaseError> {
        let content = self.fetch_note(date)?.map(|n| n.content).unwrap_or_default();
        let tasks = checklist::parse_checklist(&content);
        self.replace_tasks_for_date(date, &tasks)?;
        Ok(tasks.len())
    }

    /// Save a day's note and the checklist parsed from it atomically
    pub fn save_day(&self, date: &str, content: &str) -> Result<Vec<TaskItem>, DatabaseError> {
        let tasks = checklist::parse_checklist(content);
        let tx = self.conn.unchecked_transaction()?;
        upsert_note_in(&tx, date, content)?;
        replace_tasks_in(&tx, date, &tasks)?;
        tx.commit()?;
        debug!(date, tasks = tasks.len(), "Saved day");
        self.list_tasks_for_date(date)
    }

    // ---- pomodoro sessions ----

    /// Append a session to the log and return its ID
    pub fn add_session(&self, session: &NewSession) -> Result<i64, DatabaseError> {
        insert_session_in(&self.conn, session)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent sessions first
    pub fn list_sessions(&self, limit: usize) -> Result<Vec<PomodoroSession>, DatabaseError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(
            "SELECT id, start_time, duration, break_duration, linked_type, linked_id
             FROM pomodoro_sessions
             ORDER BY start_time DESC, id DESC
             LIMIT ?1",
        )?;
        let sessions = stmt
            .query_map(params![limit], |row| {
                Ok(PomodoroSession {
                    id: row.get("id")?,
                    start_time: row.get("start_time")?,
                    duration: row.get("duration")?,
                    break_duration: row.get("break_duration")?,
                    linked_type: row.get("linked_type")?,
                    linked_id: row.get("linked_id")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    // ---- settings ----

    /// Serialize `value` as JSON and store it under `key`
    pub fn set_setting<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), DatabaseError> {
        let payload = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO settings(key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, payload],
        )?;
        Ok(())
    }

    /// Stored value for `key`, or `default` when it is absent or unreadable
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T, DatabaseError> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get("value"),
            )
            .optional()?;

        let Some(payload) = payload else {
            return Ok(default);
        };

        match serde_json::from_str(&payload) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(key, error = %e, "Ignoring unreadable setting");
                Ok(default)
            }
        }
    }

    // ---- bulk import / backup ----

    /// Upsert notes and append sessions in a single transaction
    pub fn import_records(
        &self,
        notes: &[(String, String)],
        sessions: &[NewSession],
    ) -> Result<(), DatabaseError> {
        let tx = self.conn.unchecked_transaction()?;
        for (date, content) in notes {
            upsert_note_in(&tx, date, content)?;
        }
        for session in sessions {
            insert_session_in(&tx, session)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Copy the live database into `dest` with SQLite's online backup API
    pub fn backup_to(&self, dest: &Path) -> Result<(), DatabaseError> {
        let mut dst = Connection::open(dest)?;
        {
            let backup = Backup::new(&self.conn, &mut dst)?;
            backup.run_to_completion(64, Duration::ZERO, None)?;
        }
        Ok(())
    }
}

fn upsert_note_in(conn: &Connection, date: &str, content: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO note_entries (date, content, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(date) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
        params![date, content, utils::now_timestamp()],
    )?;
    Ok(())
}

fn replace_tasks_in(
    conn: &Connection,
    date: &str,
    tasks: &[(String, TaskStatus)],
) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM task_items WHERE date = ?1", params![date])?;
    let mut stmt = conn.prepare("INSERT INTO task_items (date, text, status) VALUES (?1, ?2, ?3)")?;
    for (text, status) in tasks {
        stmt.execute(params![date, text, status])?;
    }
    Ok(())
}

fn insert_session_in(conn: &Connection, session: &NewSession) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT INTO pomodoro_sessions (start_time, duration, break_duration, linked_type, linked_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.start_time,
            session.duration,
            session.break_duration,
            session.linked_type,
            session.linked_id
        ],
    )?;
    Ok(())
}

/// SQLITE_ERROR from a MATCH is how FTS5 reports a query it cannot parse
fn is_query_error(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::Unknown)
}

/// A query error raised by the FTS5 parser itself, not by the schema
fn is_fts5_error(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, Some(msg))
            if err.code == rusqlite::ErrorCode::Unknown && msg.starts_with("fts5:")
    )
}

/// Quote every whitespace-separated word so FTS5 reads it as a literal term
pub fn escape_fts5_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|word| format!("\"{}\"", word.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}
