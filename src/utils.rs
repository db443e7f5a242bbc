use chrono::{Datelike, Duration, NaiveDate};
use directories::{BaseDirs, ProjectDirs};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Application name used for per-user directories
pub const APP_NAME: &str = "dayplanner";

/// Database file name inside the data directory
pub const DB_FILENAME: &str = "planner.db";

/// Setting this environment variable to "1" keeps all data next to the executable
pub const PORTABLE_ENV: &str = "DAYPLANNER_PORTABLE";

/// Marker file next to the executable that enables portable mode
pub const PORTABLE_MARKER: &str = "portable.flag";

/// Profile mode for the application (dev or prod)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    Dev,
    Prod,
}

impl Profile {
    fn app_name(self) -> &'static str {
        match self {
            Profile::Dev => "dayplanner-dev",
            Profile::Prod => APP_NAME,
        }
    }

    fn portable_dir_name(self) -> &'static str {
        match self {
            Profile::Dev => "data-dev",
            Profile::Prod => "data",
        }
    }
}

#[derive(Debug, Error)]
pub enum PathError {
    #[error("Could not determine a data directory for this platform")]
    NoDataDir,
    #[error("Failed to create data directory {0}: {1}")]
    CreateDir(PathBuf, String),
}

/// Get the configuration directory path
/// If profile is Dev, uses "dayplanner-dev" instead of "dayplanner"
pub fn get_config_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", APP_NAME, profile.app_name())
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the OS-standard per-user data directory
pub fn get_data_dir(profile: Profile) -> Option<PathBuf> {
    ProjectDirs::from("com", APP_NAME, profile.app_name())
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Directory holding the running executable
pub fn install_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}

/// Returns the portable data directory when portable mode is active.
///
/// Portable mode is on when the environment flag equals "1" or the
/// marker file exists inside `install_dir`.
pub fn portable_data_dir(
    install_dir: Option<&Path>,
    env_flag: Option<&str>,
    profile: Profile,
) -> Option<PathBuf> {
    let install_dir = install_dir?;
    let flagged = env_flag == Some("1");
    if flagged || install_dir.join(PORTABLE_MARKER).exists() {
        Some(install_dir.join(profile.portable_dir_name()))
    } else {
        None
    }
}

/// Resolve the data directory and make sure it exists.
///
/// Precedence: explicit override (from the config file), portable mode,
/// then the per-user platform directory. Calling this repeatedly yields
/// the same path.
pub fn resolve_data_dir(profile: Profile, override_dir: Option<&str>) -> Result<PathBuf, PathError> {
    let env_flag = std::env::var(PORTABLE_ENV).ok();
    let dir = match override_dir {
        Some(dir) => expand_path(dir),
        None => portable_data_dir(install_dir().as_deref(), env_flag.as_deref(), profile)
            .or_else(|| get_data_dir(profile))
            .ok_or(PathError::NoDataDir)?,
    };

    std::fs::create_dir_all(&dir).map_err(|e| PathError::CreateDir(dir.clone(), e.to_string()))?;
    Ok(dir)
}

/// Expand `~` in a path string to the user's home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse a date string in ISO 8601 format (YYYY-MM-DD)
pub fn parse_date(date_str: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
}

/// Get the current date as an ISO 8601 string (YYYY-MM-DD)
pub fn get_current_date_string() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Current UTC time as an ISO 8601 timestamp without offset
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Monday of the week containing `date`
pub fn week_start_for(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_portable_via_env_flag() {
        let install = TempDir::new().unwrap();
        let dir = portable_data_dir(Some(install.path()), Some("1"), Profile::Prod);
        assert_eq!(dir, Some(install.path().join("data")));
    }

    #[test]
    fn test_portable_via_marker_file() {
        let install = TempDir::new().unwrap();
        assert_eq!(portable_data_dir(Some(install.path()), None, Profile::Prod), None);

        std::fs::write(install.path().join(PORTABLE_MARKER), "").unwrap();
        let dir = portable_data_dir(Some(install.path()), Some("0"), Profile::Dev);
        assert_eq!(dir, Some(install.path().join("data-dev")));
    }

    #[test]
    fn test_resolve_with_override_creates_directory() {
        let root = TempDir::new().unwrap();
        let target = root.path().join("nested").join("planner");
        let target_str = target.to_str().unwrap();

        let first = resolve_data_dir(Profile::Prod, Some(target_str)).unwrap();
        let second = resolve_data_dir(Profile::Prod, Some(target_str)).unwrap();
        assert_eq!(first, target);
        assert_eq!(first, second);
        assert!(target.is_dir());
    }

    #[test]
    fn test_week_start_is_monday() {
        let sunday = parse_date("2024-01-07").unwrap();
        assert_eq!(week_start_for(sunday), parse_date("2024-01-01").unwrap());
        let monday = parse_date("2024-01-01").unwrap();
        assert_eq!(week_start_for(monday), monday);
    }

    #[test]
    fn test_parse_date_rejects_other_formats() {
        assert!(parse_date("2024-02-29").is_ok());
        assert!(parse_date("01.02.2024").is_err());
    }
}
