pub mod checklist;
pub mod cli;
pub mod config;
pub mod database;
pub mod export;
pub mod models;
pub mod pomodoro;
pub mod settings;
pub mod utils;

pub use config::Config;
pub use database::Database;
pub use models::{LinkedType, NewSession, NoteEntry, PomodoroSession, TaskItem, TaskStatus};
pub use pomodoro::{PomodoroConfig, PomodoroTimer};
pub use settings::Setting;
pub use utils::Profile;
