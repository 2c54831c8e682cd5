use std::io::Write;

use chrono::Utc;

/// Severity of a diagnostic line, ordered from least to most severe.
///
/// The scale follows the syslog priorities an authentication module reports
/// with: `Alert` is reserved for conditions an operator must act on at once,
/// such as a missing configuration file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warn,
    Error,
    Crit,
    Alert,
}

impl LogLevel {
    pub fn from_str(level: &str) -> Self {
        match level.trim().to_uppercase().as_str() {
            "DEBUG" => LogLevel::Debug,
            "INFO" => LogLevel::Info,
            "NOTICE" => LogLevel::Notice,
            "WARN" => LogLevel::Warn,
            "ERROR" => LogLevel::Error,
            "CRIT" => LogLevel::Crit,
            "ALERT" => LogLevel::Alert,
            _ => LogLevel::Info, // default
        }
    }

    /// True when a message at `message_level` passes this threshold.
    pub fn should_log(&self, message_level: &LogLevel) -> bool {
        message_level >= self
    }

    /// Fixed-width tag used on console lines.
    pub fn code(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBG",
            LogLevel::Info => "INFO",
            LogLevel::Notice => "NOTE",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERRO",
            LogLevel::Crit => "CRIT",
            LogLevel::Alert => "ALRT",
        }
    }

    /// Closest `tracing` level. Everything above `Error` collapses into it.
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info | LogLevel::Notice => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Crit | LogLevel::Alert => tracing::Level::ERROR,
        }
    }
}

/// Destination for loader diagnostics.
///
/// A sink may fail; callers inside this crate go through [`emit`], which
/// drops the error so diagnostics never change a load result.
pub trait LogSink {
    fn write(&self, level: LogLevel, message: &str) -> Result<(), Box<dyn std::error::Error>>;
}

/// Sends `message` to `sink`, ignoring any sink failure.
pub fn emit(sink: &dyn LogSink, level: LogLevel, message: &str) {
    let _ = sink.write(level, message);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write(&self, _level: LogLevel, _message: &str) -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct Logger {
    pub host: String,
    pub log_level: LogLevel,
    pub log_console: bool,
}

impl Logger {
    pub fn new(host: String, log_level: LogLevel, log_console: bool) -> Self {
        Self {
            host,
            log_level,
            log_console,
        }
    }

    // Console format: [TS(24)] [LVL(4)] [HOST(32)]: [MSG]
    fn console_line(&self, level: LogLevel, message: &str) -> String {
        let ts = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");
        let host: String = self.host.chars().take(32).collect();
        let host_padded = format!("{:<32}", host);
        format!("{} {} {}: {}", ts, level.code(), host_padded, message)
    }
}

impl LogSink for Logger {
    fn write(&self, level: LogLevel, message: &str) -> Result<(), Box<dyn std::error::Error>> {
        if !self.log_level.should_log(&level) {
            return Ok(());
        }

        match level.tracing_level() {
            tracing::Level::DEBUG => tracing::debug!(host = %self.host, "{}", message),
            tracing::Level::INFO => tracing::info!(host = %self.host, "{}", message),
            tracing::Level::WARN => tracing::warn!(host = %self.host, "{}", message),
            _ => tracing::error!(host = %self.host, severity = level.code(), "{}", message),
        }

        if self.log_console {
            let line = self.console_line(level, message);
            writeln!(std::io::stderr().lock(), "{}", line)?;
        }
        Ok(())
    }
}
