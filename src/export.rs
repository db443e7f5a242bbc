//! Backups and JSON/Markdown export and import.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::database::{Database, DatabaseError};
use crate::models::{LinkedType, NewSession, NoteEntry, PomodoroSession};

/// Name of the backup folder inside the data directory
pub const BACKUP_DIR_NAME: &str = "Backups";

/// Sessions included in a JSON export
pub const DEFAULT_EXPORT_SESSION_LIMIT: usize = 1000;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("Failed to write {0}: {1}")]
    WriteError(PathBuf, String),
    #[error("Invalid import file {0}: {1}")]
    BadInput(PathBuf, String),
}

/// Document written by [`export_database_to_json`]
#[derive(Debug, Serialize)]
pub struct ExportDocument {
    pub notes: Vec<NoteEntry>,
    pub sessions: Vec<PomodoroSession>,
}

#[derive(Debug, Deserialize)]
struct ImportDocument {
    #[serde(default)]
    notes: Vec<ImportedNote>,
    #[serde(default)]
    sessions: Vec<ImportedSession>,
}

#[derive(Debug, Deserialize)]
struct ImportedNote {
    date: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ImportedSession {
    start_time: String,
    duration: i64,
    break_duration: i64,
    #[serde(default)]
    linked_type: LinkedType,
    #[serde(default)]
    linked_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub notes: usize,
    pub sessions: usize,
}

/// Hot-copy the database into `<data_dir>/Backups/planner_<YYYYMMDD_HHMMSS>.db`
pub fn backup_database(db: &Database, data_dir: &Path) -> Result<PathBuf, ExportError> {
    let backup_dir = data_dir.join(BACKUP_DIR_NAME);
    fs::create_dir_all(&backup_dir)
        .map_err(|e| ExportError::WriteError(backup_dir.clone(), e.to_string()))?;

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let backup_path = backup_dir.join(format!("planner_{timestamp}.db"));
    db.backup_to(&backup_path)?;

    info!(path = %backup_path.display(), "Database backed up");
    Ok(backup_path)
}

/// Render seven days starting at `start` as Markdown sections
pub fn render_week_markdown(db: &Database, start: NaiveDate) -> Result<String, DatabaseError> {
    let mut lines = Vec::with_capacity(21);
    for offset in 0..7 {
        let day = start + Duration::days(offset);
        let note = db.fetch_note(&day.format("%Y-%m-%d").to_string())?;
        lines.push(format!("## {}", day.format("%A %d.%m.%Y")));
        lines.push(note.map(|n| n.content).unwrap_or_default());
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

pub fn export_week_to_markdown(db: &Database, start: NaiveDate, target: &Path) -> Result<(), ExportError> {
    let markdown = render_week_markdown(db, start)?;
    fs::write(target, markdown).map_err(|e| ExportError::WriteError(target.to_path_buf(), e.to_string()))?;
    info!(path = %target.display(), %start, "Exported week");
    Ok(())
}

/// Write all notes and the most recent sessions as one JSON document
pub fn export_database_to_json(db: &Database, target: &Path, session_limit: usize) -> Result<(), ExportError> {
    let document = ExportDocument {
        notes: db.list_notes(None, None)?,
        sessions: db.list_sessions(session_limit)?,
    };
    let json = serde_json::to_string_pretty(&document)
        .map_err(|e| ExportError::WriteError(target.to_path_buf(), e.to_string()))?;
    fs::write(target, json).map_err(|e| ExportError::WriteError(target.to_path_buf(), e.to_string()))?;

    info!(
        path = %target.display(),
        notes = document.notes.len(),
        sessions = document.sessions.len(),
        "Exported database"
    );
    Ok(())
}

/// Upsert every note and append every session from a JSON export.
///
/// Sessions have no natural key, so importing the same file twice
/// appends its sessions twice.
pub fn import_database_from_json(db: &Database, source: &Path) -> Result<ImportSummary, ExportError> {
    let raw = fs::read_to_string(source).map_err(|e| ExportError::BadInput(source.to_path_buf(), e.to_string()))?;
    let document: ImportDocument =
        serde_json::from_str(&raw).map_err(|e| ExportError::BadInput(source.to_path_buf(), e.to_string()))?;

    let notes: Vec<(String, String)> = document
        .notes
        .into_iter()
        .map(|note| (note.date, note.content))
        .collect();
    let sessions: Vec<NewSession> = document
        .sessions
        .into_iter()
        .map(|s| NewSession::new(s.start_time, s.duration, s.break_duration, s.linked_type).with_link(s.linked_id))
        .collect();

    db.import_records(&notes, &sessions)?;

    let summary = ImportSummary {
        notes: notes.len(),
        sessions: sessions.len(),
    };
    info!(path = %source.display(), notes = summary.notes, sessions = summary.sessions, "Imported database");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_date;
    use tempfile::TempDir;

    fn seeded() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.upsert_note("2024-01-01", "Buy milk\n- [ ] task A").unwrap();
        db.upsert_note("2024-01-03", "Gym").unwrap();
        db.add_session(&NewSession::new("2024-01-01T10:00:00".to_string(), 1500, 300, LinkedType::Day))
            .unwrap();
        db
    }

    #[test]
    fn test_week_markdown_layout() {
        let db = seeded();
        let md = render_week_markdown(&db, parse_date("2024-01-01").unwrap()).unwrap();
        let lines: Vec<&str> = md.lines().collect();

        assert_eq!(lines[0], "## Monday 01.01.2024");
        assert_eq!(lines[1], "Buy milk");
        assert_eq!(lines[2], "- [ ] task A");
        assert_eq!(lines[3], "");
        assert_eq!(lines[4], "## Tuesday 02.01.2024");
        assert_eq!(lines[5], "");
        assert_eq!(md.matches("## ").count(), 7);
        assert!(md.contains("## Wednesday 03.01.2024\nGym\n"));
        assert!(md.contains("## Sunday 07.01.2024"));
    }

    #[test]
    fn test_export_week_writes_file() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("week.md");
        export_week_to_markdown(&seeded(), parse_date("2024-01-01").unwrap(), &target).unwrap();
        assert!(fs::read_to_string(&target).unwrap().starts_with("## Monday 01.01.2024\n"));
    }

    #[test]
    fn test_json_roundtrip_into_fresh_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        let source = seeded();
        export_database_to_json(&source, &path, DEFAULT_EXPORT_SESSION_LIMIT).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["notes"].as_array().unwrap().len(), 2);
        assert_eq!(raw["sessions"][0]["linked_type"], "day");
        assert!(raw["sessions"][0]["id"].is_i64());

        let target = Database::open_in_memory().unwrap();
        let summary = import_database_from_json(&target, &path).unwrap();
        assert_eq!(summary, ImportSummary { notes: 2, sessions: 1 });

        let original: Vec<(String, String)> = source
            .list_notes(None, None)
            .unwrap()
            .into_iter()
            .map(|n| (n.date, n.content))
            .collect();
        let imported: Vec<(String, String)> = target
            .list_notes(None, None)
            .unwrap()
            .into_iter()
            .map(|n| (n.date, n.content))
            .collect();
        assert_eq!(original, imported);
        assert_eq!(target.search_notes("milk").unwrap().len(), 1);
    }

    #[test]
    fn test_reimport_appends_sessions() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("export.json");
        let db = seeded();
        export_database_to_json(&db, &path, DEFAULT_EXPORT_SESSION_LIMIT).unwrap();

        import_database_from_json(&db, &path).unwrap();
        import_database_from_json(&db, &path).unwrap();
        assert_eq!(db.list_sessions(100).unwrap().len(), 3);
        assert_eq!(db.list_notes(None, None).unwrap().len(), 2);
    }

    #[test]
    fn test_import_fills_missing_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        fs::write(
            &path,
            r#"{"notes": [{"date": "2024-05-01"}],
                "sessions": [{"start_time": "2024-05-01T09:00:00", "duration": 600, "break_duration": 60}]}"#,
        )
        .unwrap();

        let db = Database::open_in_memory().unwrap();
        import_database_from_json(&db, &path).unwrap();
        assert_eq!(db.fetch_note("2024-05-01").unwrap().unwrap().content, "");
        let sessions = db.list_sessions(10).unwrap();
        assert_eq!(sessions[0].linked_type, LinkedType::Day);
        assert_eq!(sessions[0].linked_id, None);
    }

    #[test]
    fn test_import_bad_input() {
        let dir = TempDir::new().unwrap();
        let db = Database::open_in_memory().unwrap();

        let missing = import_database_from_json(&db, &dir.path().join("nope.json"));
        assert!(matches!(missing, Err(ExportError::BadInput(_, _))));

        let path = dir.path().join("broken.json");
        fs::write(&path, "{ notes: ").unwrap();
        let broken = import_database_from_json(&db, &path);
        assert!(matches!(broken, Err(ExportError::BadInput(_, _))));
        assert!(db.list_notes(None, None).unwrap().is_empty());
    }

    #[test]
    fn test_export_to_unwritable_path_is_write_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "").unwrap();

        let result = export_database_to_json(&seeded(), &blocker.join("export.json"), DEFAULT_EXPORT_SESSION_LIMIT);
        assert!(matches!(result, Err(ExportError::WriteError(_, _))));
    }

    #[test]
    fn test_backup_file_name_and_contents() {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("planner.db")).unwrap();
        db.upsert_note("2024-01-01", "snapshot").unwrap();

        let path = backup_database(&db, dir.path()).unwrap();
        assert_eq!(path.parent().unwrap(), dir.path().join(BACKUP_DIR_NAME));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("planner_") && name.ends_with(".db"));
        assert_eq!(name.len(), "planner_YYYYMMDD_HHMMSS.db".len());

        let copy = Database::new(&path).unwrap();
        assert_eq!(copy.fetch_note("2024-01-01").unwrap().unwrap().content, "snapshot");
    }
}
