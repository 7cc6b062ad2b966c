use std::str::FromStr;

use log::LevelFilter;
use log4rs::{
    Config,
    append::{
        console::{ConsoleAppender, Target},
        rolling_file::{
            RollingFileAppender,
            policy::compound::{
                CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
            },
        },
    },
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use thiserror::Error;

const LOG_SIZE_LIMIT: u64 = 10 * 1024 * 1024; // 10 MB

const LOG_FILE_COUNT: u32 = 3;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("invalid LOG_LEVEL {0:?}")]
    InvalidLevel(String),
    #[error("failed to set up log file: {0}")]
    File(String),
    #[error("invalid logger config: {0}")]
    Config(String),
    #[error("logger already initialized: {0}")]
    Init(#[from] log::SetLoggerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub stderr_level: LevelFilter,
    pub file: Option<LogFileSettings>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileSettings {
    pub path: String,
    pub archive_pattern: String,
}

impl LogSettings {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LoggerError> {
        let stderr_level = match lookup("LOG_LEVEL") {
            Some(level) => {
                LevelFilter::from_str(level.trim()).map_err(|_| LoggerError::InvalidLevel(level))?
            }
            None => LevelFilter::Info,
        };
        let file = lookup("LOG_FILE_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(|path| {
                let archive_pattern = lookup("LOG_ARCHIVE_PATTERN")
                    .filter(|pattern| !pattern.trim().is_empty())
                    .unwrap_or_else(|| format!("{}.{{}}.gz", path));
                LogFileSettings {
                    path,
                    archive_pattern,
                }
            });
        Ok(Self { stderr_level, file })
    }
}

/// Stdout carries protocol traffic, so nothing here may log to it.
pub fn init_logger() -> Result<(), LoggerError> {
    let settings = LogSettings::from_lookup(|key| std::env::var(key).ok())?;

    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .build();

    let mut config = Config::builder().appender(
        Appender::builder()
            .filter(Box::new(ThresholdFilter::new(settings.stderr_level)))
            .build("stderr", Box::new(stderr)),
    );
    let mut root = Root::builder().appender("stderr");

    if let Some(file) = &settings.file {
        let trigger = SizeTrigger::new(LOG_SIZE_LIMIT);
        let roller = FixedWindowRoller::builder()
            .build(&file.archive_pattern, LOG_FILE_COUNT)
            .map_err(|e| LoggerError::File(e.to_string()))?;
        let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

        let logfile = RollingFileAppender::builder()
            .encoder(Box::new(PatternEncoder::new("{d} {l} - {m}\n")))
            .build(&file.path, Box::new(policy))
            .map_err(|e| LoggerError::File(e.to_string()))?;

        config = config.appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Debug)))
                .build("logfile", Box::new(logfile)),
        );
        root = root.appender("logfile");
    }

    let config = config
        .build(root.build(LevelFilter::Trace))
        .map_err(|e| LoggerError::Config(e.to_string()))?;

    let _handle = log4rs::init_config(config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<LogSettings, LoggerError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_log_info_to_stderr_only() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.stderr_level, LevelFilter::Info);
        assert_eq!(settings.file, None);
    }

    #[test]
    fn test_file_settings() {
        let file_settings =
            settings(&[("LOG_LEVEL", "warn"), ("LOG_FILE_PATH", "logs/email.log")]).unwrap();
        assert_eq!(file_settings.stderr_level, LevelFilter::Warn);
        assert_eq!(
            file_settings.file,
            Some(LogFileSettings {
                path: "logs/email.log".to_string(),
                archive_pattern: "logs/email.log.{}.gz".to_string(),
            })
        );
    }

    #[test]
    fn test_custom_archive_pattern() {
        let file_settings = settings(&[
            ("LOG_FILE_PATH", "logs/email.log"),
            ("LOG_ARCHIVE_PATTERN", "logs/old.{}.log"),
        ])
        .unwrap();
        assert_eq!(file_settings.file.unwrap().archive_pattern, "logs/old.{}.log");
    }

    #[test]
    fn test_invalid_level() {
        assert!(matches!(
            settings(&[("LOG_LEVEL", "loud")]),
            Err(LoggerError::InvalidLevel(level)) if level == "loud"
        ));
    }
}
