/// Structured logging for the fire monitoring service
///
/// Provides context-rich logging with component and device/location
/// identifiers, timestamps, and severity levels. Supports both console
/// output and file-based logging for daemon operations.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

use crate::model::FireWatchError;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Components
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Backend,
    Reducer,
    Alert,
    Scheduler,
    Maintenance,
    System,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::Backend => write!(f, "BACKEND"),
            Component::Reducer => write!(f, "REDUCE"),
            Component::Alert => write!(f, "ALERT"),
            Component::Scheduler => write!(f, "POLL"),
            Component::Maintenance => write!(f, "MAINT"),
            Component::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Failure Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureType {
    /// Expected failure - device may be unplugged or mid-maintenance
    Expected,
    /// Unexpected failure - indicates service degradation or configuration issue
    Unexpected,
    /// Unknown - cannot determine if this is expected or not
    Unknown,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureType::Expected => write!(f, "EXPECTED"),
            FailureType::Unexpected => write!(f, "UNEXPECTED"),
            FailureType::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
    /// Whether to include timestamps in console output
    console_timestamps: bool,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>, console_timestamps: bool) {
        let logger = Logger {
            min_level,
            log_file,
            console_timestamps,
        };

        if let Ok(mut slot) = LOGGER.lock() {
            *slot = Some(logger);
        }
    }

    fn format_entry(level: LogLevel, component: Component, subject: Option<&str>, message: &str) -> String {
        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();
        format!("{} {} {}{}: {}", timestamp, level, component, subject_part, message)
    }

    fn log(&self, level: LogLevel, component: Component, subject: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let log_entry = Self::format_entry(level, component, subject, message);
        let subject_part = subject.map(|s| format!(" [{}]", s)).unwrap_or_default();

        // Console output
        if self.console_timestamps {
            match level {
                LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
                LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
            }
        } else {
            match level {
                LogLevel::Error => eprintln!("   ✗ {}{}: {}", component, subject_part, message),
                LogLevel::Warning => eprintln!("   ⚠ {}{}: {}", component, subject_part, message),
                LogLevel::Info => println!("   {}", message),
                LogLevel::Debug => {} // Skip debug in non-timestamp mode
            }
        }

        // File output
        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>, console_timestamps: bool) {
    Logger::init(min_level, log_file.map(String::from), console_timestamps);
}

fn dispatch(level: LogLevel, component: Component, subject: Option<&str>, message: &str) {
    if let Ok(guard) = LOGGER.lock() {
        if let Some(logger) = guard.as_ref() {
            logger.log(level, component, subject, message);
        }
    }
}

/// Log a general informational message
pub fn info(component: Component, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Info, component, subject, message);
}

/// Log a warning message
pub fn warn(component: Component, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Warning, component, subject, message);
}

/// Log an error message
pub fn error(component: Component, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Error, component, subject, message);
}

/// Log a debug message
pub fn debug(component: Component, subject: Option<&str>, message: &str) {
    dispatch(LogLevel::Debug, component, subject, message);
}

// ---------------------------------------------------------------------------
// Failure Classification Helpers
// ---------------------------------------------------------------------------

/// Classify a backend failure.
///
/// Server errors, transport failures and unparseable bodies point at the
/// service or its configuration. Client errors (expired key, missing row)
/// may be transient and are left unclassified.
pub fn classify_backend_failure(err: &FireWatchError) -> FailureType {
    match err {
        FireWatchError::HttpError(code) if *code >= 500 => FailureType::Unexpected,
        FireWatchError::HttpError(_) => FailureType::Unknown,
        FireWatchError::Transport(_) | FireWatchError::ParseError(_) => FailureType::Unexpected,
        FireWatchError::MalformedIdentifier(_) => FailureType::Expected,
        FireWatchError::Config(_) | FireWatchError::AlreadyRunning => FailureType::Unknown,
    }
}

// ---------------------------------------------------------------------------
// Structured Failure Logging
// ---------------------------------------------------------------------------

/// Log a backend failure with automatic classification
pub fn log_backend_failure(subject: Option<&str>, operation: &str, err: &FireWatchError) {
    let failure_type = classify_backend_failure(err);
    let message = format!("{} failed [{}]: {}", operation, failure_type, err);

    match failure_type {
        FailureType::Expected => debug(Component::Backend, subject, &message),
        FailureType::Unexpected => error(Component::Backend, subject, &message),
        FailureType::Unknown => warn(Component::Backend, subject, &message),
    }
}

// ---------------------------------------------------------------------------
// Bulk Summary Logging
// ---------------------------------------------------------------------------

/// Log a summary of a per-device bulk operation
pub fn log_bulk_summary(component: Component, operation: &str, total: usize, successful: usize, failed: usize) {
    let message = format!(
        "{} complete: {}/{} successful, {} failed",
        operation, successful, total, failed
    );

    if failed == 0 {
        info(component, None, &message);
    } else if successful == 0 {
        error(component, None, &message);
    } else {
        warn(component, None, &message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_ordering() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Info < LogLevel::Warning);
        assert!(LogLevel::Warning < LogLevel::Error);
    }

    #[test]
    fn test_failure_classification() {
        assert_eq!(
            classify_backend_failure(&FireWatchError::HttpError(503)),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_backend_failure(&FireWatchError::HttpError(401)),
            FailureType::Unknown
        );
        assert_eq!(
            classify_backend_failure(&FireWatchError::Transport("connection refused".into())),
            FailureType::Unexpected
        );
        assert_eq!(
            classify_backend_failure(&FireWatchError::MalformedIdentifier("lab".into())),
            FailureType::Expected
        );
    }

    #[test]
    fn test_entry_format_includes_component_and_subject() {
        let entry = Logger::format_entry(LogLevel::Warning, Component::Alert, Some("305"), "fire persists");
        assert!(entry.ends_with("WARN ALERT [305]: fire persists"), "got {}", entry);
    }

    #[test]
    fn test_file_logging_appends_entries() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("firewatch.log");
        let path_str = path.to_str().expect("utf-8 path");

        let logger = Logger {
            min_level: LogLevel::Info,
            log_file: Some(path_str.to_string()),
            console_timestamps: false,
        };
        logger.log(LogLevel::Info, Component::System, None, "first");
        logger.log(LogLevel::Debug, Component::System, None, "filtered");
        logger.log(LogLevel::Error, Component::Backend, Some("esp-1"), "second");

        let contents = std::fs::read_to_string(&path).expect("log written");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("INFO SYS: first"));
        assert!(lines[1].ends_with("ERROR BACKEND [esp-1]: second"));
    }
}
