use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::database::{Database, DatabaseError};
use crate::export::{self, ExportError};
use crate::models::{LinkedType, NewSession, TaskStatus};
use crate::pomodoro::{self, PomodoroConfig, PomodoroTimer, Tick};
use crate::utils::{self, get_current_date_string, parse_date};

#[derive(Parser)]
#[command(name = "dayplanner")]
#[command(about = "Daily notes, checklists and pomodoro history in a local database")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use development mode (uses separate dev config/database)
    #[arg(long)]
    pub dev: bool,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read, write and search day notes
    Note {
        #[command(subcommand)]
        command: NoteCommands,
    },
    /// Manage a day's checklist
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Pomodoro session history
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Raw key/JSON settings
    Setting {
        #[command(subcommand)]
        command: SettingCommands,
    },
    /// Pomodoro timer and its configuration
    Pomodoro {
        #[command(subcommand)]
        command: PomodoroCommands,
    },
    /// Write a timestamped copy of the database to the backup folder
    Backup,
    /// Export notes to Markdown or JSON
    Export {
        #[command(subcommand)]
        command: ExportCommands,
    },
    /// Import notes and sessions from a JSON export
    Import {
        /// Path of the JSON file
        path: PathBuf,
    },
    /// Rebuild the full-text search index
    Reindex,
    /// Show the resolved data, database and config locations
    Paths,
}

#[derive(Subcommand)]
pub enum NoteCommands {
    /// Create or replace the note of a day
    Set {
        /// Note content
        content: String,
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Also replace the day's tasks with the note's checklist
        #[arg(long)]
        sync_tasks: bool,
    },
    /// Print the note of a day
    Show {
        /// Date (YYYY-MM-DD), defaults to today
        date: Option<String>,
    },
    /// Full-text search over all notes
    Search {
        /// Search query (words, OR, quoted phrases, prefix*)
        query: String,
    },
    /// List notes, newest first
    List {
        /// First date of the range (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<String>,
        /// Last date of the range (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Replace all tasks of a day; prefix an item with "x:" to mark it done
    Set {
        /// Date (YYYY-MM-DD)
        date: String,
        /// Task texts, in order
        items: Vec<String>,
    },
    /// Print the tasks of a day
    Show {
        /// Date (YYYY-MM-DD), defaults to today
        date: Option<String>,
    },
    /// Rebuild a day's tasks from the checklist in its note
    Sync {
        /// Date (YYYY-MM-DD), defaults to today
        date: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum SessionCommands {
    /// Append a finished session to the history
    Add {
        /// Start time (YYYY-MM-DDTHH:MM:SS, UTC), defaults to now
        #[arg(long)]
        start: Option<String>,
        /// Focus length in seconds
        #[arg(long, default_value_t = 1500)]
        duration: i64,
        /// Break length in seconds
        #[arg(long, default_value_t = 300)]
        break_duration: i64,
        /// day, task or project
        #[arg(long, default_value = "day")]
        linked_type: LinkedType,
        /// Free-form reference (task text, project name)
        #[arg(long)]
        linked_id: Option<String>,
    },
    /// Print the most recent sessions
    List {
        /// Maximum number of sessions
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum SettingCommands {
    /// Print the JSON value stored under a key
    Get { key: String },
    /// Store a JSON value under a key
    Set { key: String, value: String },
}

#[derive(Subcommand)]
pub enum PomodoroCommands {
    /// Print the pomodoro configuration
    Show,
    /// Change the pomodoro configuration
    Set {
        #[arg(long)]
        focus: Option<u32>,
        #[arg(long)]
        short_break: Option<u32>,
        #[arg(long)]
        long_break: Option<u32>,
        #[arg(long)]
        cycles: Option<u32>,
    },
    /// Run the timer in the terminal, recording each finished focus phase
    Start {
        /// Stop after this many focus phases
        #[arg(long, default_value_t = 1)]
        rounds: u32,
        #[arg(long, default_value = "day")]
        linked_type: LinkedType,
        #[arg(long)]
        linked_id: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ExportCommands {
    /// Export seven days of notes as Markdown
    Week {
        /// Target file
        path: PathBuf,
        /// First day (YYYY-MM-DD), defaults to this week's Monday
        #[arg(long)]
        start: Option<String>,
    },
    /// Export all notes and recent sessions as JSON
    Json {
        /// Target file
        path: PathBuf,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DatabaseError),
    #[error("{0}")]
    ExportError(#[from] ExportError),
    #[error("Failed to parse date: {0}")]
    DateParseError(String),
    #[error("Invalid JSON value: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Everything a command needs besides its arguments
pub struct Context<'a> {
    pub db: &'a Database,
    pub config: &'a Config,
    pub data_dir: &'a Path,
    pub config_path: &'a Path,
}

/// Dispatch a parsed command
pub fn run(command: Commands, ctx: &Context) -> Result<(), CliError> {
    match command {
        Commands::Note { command } => handle_note(command, ctx.db),
        Commands::Tasks { command } => handle_tasks(command, ctx.db),
        Commands::Session { command } => handle_session(command, ctx),
        Commands::Setting { command } => handle_setting(command, ctx.db),
        Commands::Pomodoro { command } => handle_pomodoro(command, ctx.db),
        Commands::Backup => {
            let path = export::backup_database(ctx.db, ctx.data_dir)?;
            println!("Backup written to {}", path.display());
            Ok(())
        }
        Commands::Export { command } => handle_export(command, ctx),
        Commands::Import { path } => {
            let summary = export::import_database_from_json(ctx.db, &path)?;
            println!(
                "Imported {} notes and {} sessions",
                summary.notes, summary.sessions
            );
            Ok(())
        }
        Commands::Reindex => {
            ctx.db.rebuild_search_index()?;
            println!("Search index rebuilt");
            Ok(())
        }
        Commands::Paths => {
            println!("Data directory: {}", ctx.data_dir.display());
            println!("Database:       {}", ctx.data_dir.join(utils::DB_FILENAME).display());
            println!("Backups:        {}", ctx.data_dir.join(export::BACKUP_DIR_NAME).display());
            println!("Config file:    {}", ctx.config_path.display());
            Ok(())
        }
    }
}

/// Validate a YYYY-MM-DD argument, defaulting to today
fn resolve_date(date: Option<String>) -> Result<String, CliError> {
    match date {
        Some(date) => {
            parse_date(&date)
                .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", date, e)))?;
            Ok(date)
        }
        None => Ok(get_current_date_string()),
    }
}

/// "x:text" is a done item, anything else is undone
fn parse_task_arg(arg: &str) -> (String, TaskStatus) {
    match arg.strip_prefix("x:") {
        Some(text) => (text.trim().to_string(), TaskStatus::Done),
        None => (arg.trim().to_string(), TaskStatus::Undone),
    }
}

fn print_tasks(date: &str, db: &Database) -> Result<(), CliError> {
    for task in db.list_tasks_for_date(date)? {
        let mark = if task.status.is_done() { "x" } else { " " };
        println!("- [{}] {}", mark, task.text);
    }
    Ok(())
}

fn handle_note(command: NoteCommands, db: &Database) -> Result<(), CliError> {
    match command {
        NoteCommands::Set { content, date, sync_tasks } => {
            let date = resolve_date(date)?;
            if sync_tasks {
                let tasks = db.save_day(&date, &content)?;
                println!("Note for {} saved with {} tasks", date, tasks.len());
            } else {
                db.upsert_note(&date, &content)?;
                println!("Note for {} saved", date);
            }
        }
        NoteCommands::Show { date } => {
            let date = resolve_date(date)?;
            match db.fetch_note(&date)? {
                Some(note) => println!("{}", note.content),
                None => println!("No note for {}", date),
            }
        }
        NoteCommands::Search { query } => {
            let notes = db.search_notes(&query)?;
            if notes.is_empty() {
                println!("No matches");
            }
            for note in notes {
                let first_line = note.content.lines().next().unwrap_or_default();
                println!("{}  {}", note.date, first_line);
            }
        }
        NoteCommands::List { from, to } => {
            let from = from.map(|d| resolve_date(Some(d))).transpose()?;
            let to = to.map(|d| resolve_date(Some(d))).transpose()?;
            for note in db.list_notes(from.as_deref(), to.as_deref())? {
                let first_line = note.content.lines().next().unwrap_or_default();
                println!("{}  {}", note.date, first_line);
            }
        }
    }
    Ok(())
}

fn handle_tasks(command: TaskCommands, db: &Database) -> Result<(), CliError> {
    match command {
        TaskCommands::Set { date, items } => {
            let date = resolve_date(Some(date))?;
            let tasks: Vec<(String, TaskStatus)> = items
                .iter()
                .map(|item| parse_task_arg(item))
                .filter(|(text, _)| !text.is_empty())
                .collect();
            db.replace_tasks_for_date(&date, &tasks)?;
            print_tasks(&date, db)?;
        }
        TaskCommands::Show { date } => {
            let date = resolve_date(date)?;
            print_tasks(&date, db)?;
        }
        TaskCommands::Sync { date } => {
            let date = resolve_date(date)?;
            let count = db.sync_tasks_from_note(&date)?;
            println!("{} tasks synced for {}", count, date);
        }
    }
    Ok(())
}

fn handle_session(command: SessionCommands, ctx: &Context) -> Result<(), CliError> {
    match command {
        SessionCommands::Add {
            start,
            duration,
            break_duration,
            linked_type,
            linked_id,
        } => {
            let start = start.unwrap_or_else(utils::now_timestamp);
            let session = NewSession::new(start, duration, break_duration, linked_type).with_link(linked_id);
            let id = ctx.db.add_session(&session)?;
            println!("Session recorded (ID: {})", id);
        }
        SessionCommands::List { limit } => {
            let limit = limit.unwrap_or(ctx.config.session_list_limit);
            for s in ctx.db.list_sessions(limit)? {
                println!(
                    "{}  {} min focus / {} min break  {} {}",
                    s.start_time,
                    s.duration / 60,
                    s.break_duration / 60,
                    s.linked_type,
                    s.linked_id.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}

fn handle_setting(command: SettingCommands, db: &Database) -> Result<(), CliError> {
    match command {
        SettingCommands::Get { key } => {
            let value: serde_json::Value = db.get_setting(&key, serde_json::Value::Null)?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        SettingCommands::Set { key, value } => {
            let value: serde_json::Value = serde_json::from_str(&value)?;
            db.set_setting(&key, &value)?;
            println!("Setting '{}' saved", key);
        }
    }
    Ok(())
}

fn handle_pomodoro(command: PomodoroCommands, db: &Database) -> Result<(), CliError> {
    match command {
        PomodoroCommands::Show => {
            let config: PomodoroConfig = db.load_setting()?;
            println!("Focus:       {} min", config.focus_minutes);
            println!("Short break: {} min", config.short_break_minutes);
            println!("Long break:  {} min", config.long_break_minutes);
            println!("Long break every {} cycles", config.cycles_before_long_break);
        }
        PomodoroCommands::Set {
            focus,
            short_break,
            long_break,
            cycles,
        } => {
            let mut config: PomodoroConfig = db.load_setting()?;
            if let Some(v) = focus {
                config.focus_minutes = v;
            }
            if let Some(v) = short_break {
                config.short_break_minutes = v;
            }
            if let Some(v) = long_break {
                config.long_break_minutes = v;
            }
            if let Some(v) = cycles {
                config.cycles_before_long_break = v;
            }
            db.store_setting(&config)?;
            println!("Pomodoro configuration saved");
        }
        PomodoroCommands::Start {
            rounds,
            linked_type,
            linked_id,
        } => {
            let config: PomodoroConfig = db.load_setting()?;
            let mut timer = PomodoroTimer::new(config);
            timer.configure_link(linked_type, linked_id);
            timer.start();

            let mut finished = 0;
            while finished < rounds {
                thread::sleep(Duration::from_secs(1));
                match timer.tick() {
                    Some(Tick::Remaining(secs)) if secs % 60 == 0 => {
                        println!("{} {}", timer.phase().label(), pomodoro::format_remaining(secs));
                    }
                    Some(Tick::Completed { next, session }) => {
                        if let Some(session) = session {
                            let id = db.add_session(&session)?;
                            finished += 1;
                            println!("Focus finished (session {}), {} begins", id, next.label());
                        } else {
                            println!("Break over, {} begins", next.label());
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

fn handle_export(command: ExportCommands, ctx: &Context) -> Result<(), CliError> {
    match command {
        ExportCommands::Week { path, start } => {
            let start = match start {
                Some(s) => parse_date(&s)
                    .map_err(|e| CliError::DateParseError(format!("Invalid date format '{}': {}", s, e)))?,
                None => utils::week_start_for(chrono::Local::now().date_naive()),
            };
            export::export_week_to_markdown(ctx.db, start, &path)?;
            println!("Week of {} exported to {}", start, path.display());
        }
        ExportCommands::Json { path } => {
            export::export_database_to_json(ctx.db, &path, ctx.config.export_session_limit)?;
            println!("Database exported to {}", path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_arg() {
        assert_eq!(parse_task_arg("x: ship it"), ("ship it".to_string(), TaskStatus::Done));
        assert_eq!(parse_task_arg("write docs"), ("write docs".to_string(), TaskStatus::Undone));
    }

    #[test]
    fn test_resolve_date_validates() {
        assert_eq!(resolve_date(Some("2024-01-01".to_string())).unwrap(), "2024-01-01");
        assert!(matches!(
            resolve_date(Some("yesterday".to_string())),
            Err(CliError::DateParseError(_))
        ));
    }

    #[test]
    fn test_cli_parses_nested_commands() {
        let cli = Cli::try_parse_from([
            "dayplanner",
            "session",
            "add",
            "--linked-type",
            "project",
            "--linked-id",
            "thesis",
        ])
        .unwrap();
        match cli.command {
            Commands::Session {
                command: SessionCommands::Add { linked_type, linked_id, duration, .. },
            } => {
                assert_eq!(linked_type, LinkedType::Project);
                assert_eq!(linked_id.as_deref(), Some("thesis"));
                assert_eq!(duration, 1500);
            }
            _ => panic!("wrong command"),
        }
    }

    #[test]
    fn test_note_list_requires_both_bounds() {
        assert!(Cli::try_parse_from(["dayplanner", "note", "list", "--from", "2024-01-01"]).is_err());
        assert!(
            Cli::try_parse_from(["dayplanner", "note", "list", "--from", "2024-01-01", "--to", "2024-01-07"]).is_ok()
        );
    }

    #[test]
    fn test_run_tasks_and_settings_commands() {
        let db = Database::open_in_memory().unwrap();
        handle_tasks(
            TaskCommands::Set {
                date: "2024-01-01".to_string(),
                items: vec!["x:done thing".to_string(), "open thing".to_string(), " ".to_string()],
            },
            &db,
        )
        .unwrap();
        let tasks = db.list_tasks_for_date("2024-01-01").unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].status.is_done());

        handle_setting(
            SettingCommands::Set {
                key: "pomodoro".to_string(),
                value: r#"{"focus": 40}"#.to_string(),
            },
            &db,
        )
        .unwrap();
        let config: PomodoroConfig = db.load_setting().unwrap();
        assert_eq!(config.focus_minutes, 40);
        assert_eq!(config.short_break_minutes, 5);

        let bad = handle_setting(
            SettingCommands::Set {
                key: "x".to_string(),
                value: "{oops".to_string(),
            },
            &db,
        );
        assert!(matches!(bad, Err(CliError::JsonError(_))));
    }
}
