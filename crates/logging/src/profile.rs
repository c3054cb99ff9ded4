use std::fs;
use std::io;

use log::LevelFilter;
use serde::Deserialize;

pub const DEFAULT_PATTERN: &str = "MB | {d(%Y-%m-%d %H:%M:%S)} | {({l}):5.5} | {f}:{L} | {m}{n}";

#[derive(Debug)]
pub enum LoggingProfileError {
    FileReadError(io::Error),
    ConfigParseError,
    InvalidLevel(String),
}

pub fn read_logging_profile(path: &str) -> Result<LoggingProfile, LoggingProfileError> {
    let contents = fs::read_to_string(path)
        .map_err(LoggingProfileError::FileReadError)?;

    parse_logging_profile(contents.as_str())
}

/// Like [`read_logging_profile`], but a profile that doesn't exist yields the defaults.
pub fn load_logging_profile(path: &str) -> Result<LoggingProfile, LoggingProfileError> {
    match read_logging_profile(path) {
        Err(LoggingProfileError::FileReadError(e)) if e.kind() == io::ErrorKind::NotFound => {
            Ok(LoggingProfile::default())
        }
        result => result,
    }
}

pub fn parse_logging_profile(contents: &str) -> Result<LoggingProfile, LoggingProfileError> {
    let profile: LoggingProfile = toml::from_str(contents)
        .map_err(|_| LoggingProfileError::ConfigParseError)?;

    // Reject bad levels up front rather than at init time.
    profile.level_filter()?;

    Ok(profile)
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct LoggingProfile {
    /// Log file to write to in addition to the console.
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl LoggingProfile {
    pub fn level_filter(&self) -> Result<LevelFilter, LoggingProfileError> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| LoggingProfileError::InvalidLevel(self.level.clone()))
    }
}

impl Default for LoggingProfile {
    fn default() -> Self {
        Self {
            file: None,
            level: default_level(),
            pattern: default_pattern(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_pattern() -> String {
    DEFAULT_PATTERN.to_string()
}
