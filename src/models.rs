use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One note per calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub date: String,       // YYYY-MM-DD, unique
    pub content: String,
    pub updated_at: String, // UTC, YYYY-MM-DDTHH:MM:SS
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Done,
    Undone,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskItem {
    pub id: i64,
    pub date: String,
    pub text: String,
    pub status: TaskStatus,
}

/// What a pomodoro session was spent on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkedType {
    #[default]
    Day,
    Task,
    Project,
}

/// A finished focus session as it is appended to the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub start_time: String,
    pub duration: i64,       // seconds of focus
    pub break_duration: i64, // seconds of the break that followed
    pub linked_type: LinkedType,
    pub linked_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PomodoroSession {
    pub id: i64,
    pub start_time: String,
    pub duration: i64,
    pub break_duration: i64,
    pub linked_type: LinkedType,
    pub linked_id: Option<String>,
}

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct ParseEnumError {
    kind: &'static str,
    value: String,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Done => "done",
            TaskStatus::Undone => "undone",
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }
}

impl LinkedType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkedType::Day => "day",
            LinkedType::Task => "task",
            LinkedType::Project => "project",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LinkedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "done" => Ok(TaskStatus::Done),
            "undone" => Ok(TaskStatus::Undone),
            other => Err(ParseEnumError {
                kind: "task status",
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for LinkedType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(LinkedType::Day),
            "task" => Ok(LinkedType::Task),
            "project" => Ok(LinkedType::Project),
            other => Err(ParseEnumError {
                kind: "linked type",
                value: other.to_string(),
            }),
        }
    }
}

// Both enums are stored as their lowercase names in TEXT columns

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for LinkedType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for LinkedType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}

impl NewSession {
    pub fn new(start_time: String, duration: i64, break_duration: i64, linked_type: LinkedType) -> Self {
        Self {
            start_time,
            duration,
            break_duration,
            linked_type,
            linked_id: None,
        }
    }

    pub fn with_link(mut self, linked_id: Option<String>) -> Self {
        self.linked_id = linked_id;
        self
    }
}
