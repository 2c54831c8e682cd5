//! Failure kinds for a configuration load.
//!
//! Every variant is fatal: a load either returns a complete record or one of
//! these, never a partially populated record.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::hbac_log_client::LogLevel;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file is missing or not readable by this process
    #[error("cannot open config file {} [{}]: {source}", path.display(), errno_text(source))]
    CannotOpenFile { path: PathBuf, source: io::Error },

    /// Reading failed after the file was opened
    #[error("couldn't read from the config file {} [{}]: {source}", path.display(), errno_text(source))]
    ReadFailure { path: PathBuf, source: io::Error },

    /// A directive line has no `=` separator. The line text is not kept,
    /// it may hold a credential.
    #[error("malformed line {line_number}; no separator")]
    MalformedLine { line_number: usize },

    /// An owned copy of a key, value or default could not be allocated
    #[error("cannot allocate {what}")]
    AllocationFailure { what: &'static str },

    /// A fallback value could not be computed
    #[error("cannot resolve default configuration: {reason}")]
    DefaultResolutionFailure { reason: String },
}

/// Plain tag for each [`ConfigError`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigErrorKind {
    CannotOpenFile,
    ReadFailure,
    MalformedLine,
    AllocationFailure,
    DefaultResolutionFailure,
}

impl ConfigError {
    pub fn kind(&self) -> ConfigErrorKind {
        match self {
            ConfigError::CannotOpenFile { .. } => ConfigErrorKind::CannotOpenFile,
            ConfigError::ReadFailure { .. } => ConfigErrorKind::ReadFailure,
            ConfigError::MalformedLine { .. } => ConfigErrorKind::MalformedLine,
            ConfigError::AllocationFailure { .. } => ConfigErrorKind::AllocationFailure,
            ConfigError::DefaultResolutionFailure { .. } => {
                ConfigErrorKind::DefaultResolutionFailure
            }
        }
    }

    /// Raw OS error number behind an I/O failure, if there is one.
    pub fn os_error_code(&self) -> Option<i32> {
        match self {
            ConfigError::CannotOpenFile { source, .. } | ConfigError::ReadFailure { source, .. } => {
                source.raw_os_error()
            }
            _ => None,
        }
    }

    /// Level a caller should report this failure at.
    ///
    /// A config file that cannot be opened leaves the authentication flow
    /// without any policy source, so it is reported as an alert.
    pub fn severity(&self) -> LogLevel {
        match self {
            ConfigError::CannotOpenFile { .. } => LogLevel::Alert,
            _ => LogLevel::Crit,
        }
    }

    pub fn is_malformed_line(&self) -> bool {
        matches!(self, ConfigError::MalformedLine { .. })
    }
}

fn errno_text(err: &io::Error) -> String {
    match err.raw_os_error() {
        Some(code) => code.to_string(),
        None => "-".to_string(),
    }
}
