//! Logging module with tracing integration and sensitive data redaction.
//!
//! Hermit logs two things that must never reach a log file unredacted: the
//! rendered shell command for a step (which may embed file contents via
//! `echo '...' > path`) and the captured sandbox output. [`Redaction`] is
//! applied to both before they're passed to `tracing`.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};

mod redaction;
pub use redaction::Redaction;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Logging errors
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Logger already initialized")]
    AlreadyInitialized,

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Minimum severity emitted; maps onto `tracing::Level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            other => Err(format!("unknown log level: {other}")),
        }
    }
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// Log format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// Log rotation settings
#[derive(Debug, Clone)]
pub struct LogRotation {
    pub max_files: u32,
    pub max_size_mb: u64,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub redaction_enabled: bool,
    pub rotation: Option<LogRotation>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Stderr,
            redaction_enabled: true,
            rotation: None,
        }
    }
}

impl LogConfig {
    pub fn development() -> Self {
        Self {
            log_level: LogLevel::Debug,
            format: LogFormat::Pretty,
            output: LogOutput::Stderr,
            redaction_enabled: false,
            rotation: None,
        }
    }

    pub fn production() -> Self {
        Self {
            log_level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::File(PathBuf::from("/var/log/hermit/hermit.log")),
            redaction_enabled: true,
            rotation: Some(LogRotation {
                max_files: 7,
                max_size_mb: 100,
            }),
        }
    }
}

/// Fluent builder over [`LogConfig`].
pub struct LogConfigBuilder {
    config: LogConfig,
}

impl Default for LogConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: LogConfig::default(),
        }
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.config.output = output;
        self
    }

    pub fn redaction_enabled(mut self, enabled: bool) -> Self {
        self.config.redaction_enabled = enabled;
        self
    }

    pub fn rotation(mut self, rotation: LogRotation) -> Self {
        self.config.rotation = Some(rotation);
        self
    }

    pub fn build(self) -> LogConfig {
        self.config
    }
}

/// Global logger.
pub struct Logger;

impl Logger {
    /// Initialize the global tracing subscriber. Can only be called once per
    /// process — subsequent calls return [`LogError::AlreadyInitialized`]
    /// rather than panicking, since a session REPL restart (e.g. after a
    /// test harness reuses the process) must not crash on re-init.
    pub fn init(config: LogConfig) -> Result<(), LogError> {
        if LOGGER_INITIALIZED.swap(true, Ordering::SeqCst) {
            return Err(LogError::AlreadyInitialized);
        }

        let level_filter = config.log_level.to_tracing_level();
        let env_filter = tracing_subscriber::EnvFilter::try_from_env("HERMIT_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level_filter.to_string()));

        let subscriber = tracing_subscriber::fmt().with_env_filter(env_filter);

        match config.format {
            LogFormat::Json => subscriber.json().init(),
            LogFormat::Pretty => subscriber.pretty().init(),
            LogFormat::Compact => subscriber.compact().init(),
        }

        Ok(())
    }
}

/// RAII span for tracking a named operation's duration in logs.
pub struct OperationSpan {
    _guard: tracing::span::EnteredSpan,
}

impl OperationSpan {
    pub fn new(name: &str) -> Self {
        let span = tracing::info_span!("operation", name);
        Self {
            _guard: span.entered(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_level_parses_common_spellings() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("nonsense".parse::<LogLevel>().is_err());
    }

    #[test]
    fn development_preset_disables_redaction() {
        let config = LogConfig::development();
        assert!(!config.redaction_enabled);
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn production_preset_enables_redaction_and_rotation() {
        let config = LogConfig::production();
        assert!(config.redaction_enabled);
        assert!(config.rotation.is_some());
    }

    #[test]
    fn builder_overrides_defaults() {
        let config = LogConfigBuilder::new()
            .log_level(LogLevel::Trace)
            .redaction_enabled(false)
            .build();
        assert_eq!(config.log_level, LogLevel::Trace);
        assert!(!config.redaction_enabled);
    }
}
