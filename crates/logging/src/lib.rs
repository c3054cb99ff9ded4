use std::env;
use std::io;

use log::{LevelFilter, SetLoggerError};
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

mod profile;

pub use profile::{
    load_logging_profile, parse_logging_profile, read_logging_profile, LoggingProfile,
    LoggingProfileError, DEFAULT_PATTERN,
};

const PROFILE_PATH_VARIABLE: &str = "MEMBRANE_LOG_PROFILE";
const DEFAULT_PROFILE_PATH: &str = "./membrane_log.toml";

#[derive(Debug)]
pub enum LoggingInitError {
    ProfileError(LoggingProfileError),
    FileAppenderError(io::Error),
    ConfigError(String),
    LoggerAlreadySet(SetLoggerError),
}

impl From<LoggingProfileError> for LoggingInitError {
    fn from(e: LoggingProfileError) -> Self {
        LoggingInitError::ProfileError(e)
    }
}

/// Logs everything to the console and to `file`.
pub fn init(file: &str) -> Result<(), LoggingInitError> {
    init_with_profile(&LoggingProfile {
        file: Some(file.to_string()),
        level: LevelFilter::Trace.to_string(),
        ..LoggingProfile::default()
    })
}

/// Sets up logging from the profile named by `MEMBRANE_LOG_PROFILE`, or `./membrane_log.toml`.
pub fn init_from_env() -> Result<(), LoggingInitError> {
    let path = env::var(PROFILE_PATH_VARIABLE)
        .unwrap_or_else(|_| DEFAULT_PROFILE_PATH.to_string());

    let profile = load_logging_profile(path.as_str())?;
    init_with_profile(&profile)
}

pub fn init_with_profile(profile: &LoggingProfile) -> Result<(), LoggingInitError> {
    let config = build_config(profile)?;
    log4rs::init_config(config)
        .map_err(LoggingInitError::LoggerAlreadySet)?;

    log_panics::init();

    Ok(())
}

pub fn build_config(profile: &LoggingProfile) -> Result<Config, LoggingInitError> {
    let level = profile.level_filter()?;

    let stdout = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(profile.pattern.as_str())))
        .build();

    let mut config = Config::builder()
        .appender(Appender::builder().build("stdout", Box::new(stdout)));
    let mut root = Root::builder().appender("stdout");

    if let Some(file) = profile.file.as_ref() {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(profile.pattern.as_str())))
            .build(file)
            .map_err(LoggingInitError::FileAppenderError)?;

        config = config.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    config
        .logger(Logger::builder().build("membrane", level))
        .build(root.build(level))
        .map_err(|e| LoggingInitError::ConfigError(e.to_string()))
}
